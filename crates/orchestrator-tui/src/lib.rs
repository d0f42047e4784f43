pub mod constants;
pub mod layout;
pub mod state;
pub mod utils;

pub use state::{ErrorDisplay, ScrollState, Tab, TuiState};

use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;

use crate::layout::LayoutManager;
use crate::utils::TextWrapper;

/// Renders the output/logs/help/input panes from `state`. The TUI never
/// reads `orchestrator_core` state directly: everything it knows comes from
/// `protocol::Message`s fed into `TuiState` by whoever owns the outbound
/// subscription (see `state::TuiState::append_output`/`append_log`).
pub fn draw_ui<B: Backend>(terminal: &mut Terminal<B>, state: &TuiState) -> Result<()> {
    terminal.draw(|f| {
        let areas = LayoutManager::create_main_layout(f.area());

        let output_lines: Vec<Line> = state
            .output_buffer
            .iter()
            .flat_map(|line| TextWrapper::wrap_line(line))
            .map(Line::from)
            .collect();
        let output = Paragraph::new(output_lines)
            .block(Block::default().borders(Borders::ALL).title("Output"))
            .scroll((state.scroll.position as u16, 0));
        f.render_widget(output, areas.output);

        let log_lines: Vec<Line> = state.log_buffer.iter().map(|l| Line::from(l.as_str())).collect();
        let logs = Paragraph::new(log_lines)
            .block(Block::default().borders(Borders::ALL).title("Logs"))
            .scroll((state.log_scroll.position as u16, 0));
        f.render_widget(logs, areas.logs);

        let help_text = if state.show_help {
            "Tab: switch pane  Enter: send  Ctrl-C: quit  PgUp/PgDn: scroll"
        } else {
            "? for help"
        };
        let help = Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title("Help"));
        f.render_widget(help, areas.help);

        let input_style = if state.can_edit_input() { Style::default() } else { Style::default().fg(Color::DarkGray) };
        let input = Paragraph::new(Span::styled(format!("> {}", state.input_buffer), input_style))
            .block(Block::default().borders(Borders::ALL).title("Input"));
        f.render_widget(input, areas.input);

        if let Some(error) = &state.error_message {
            let overlay_area = LayoutManager::centered_rect(f.area());
            let body = format!("{}\n\n{}", error.message, error.details);
            let dialog = Paragraph::new(body).block(Block::default().borders(Borders::ALL).title(error.title.clone()));
            f.render_widget(dialog, overlay_area);
        }
    })?;

    Ok(())
}
