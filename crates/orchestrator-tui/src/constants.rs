pub const OVERLAY_WIDTH_PERCENT: u16 = 60;
pub const OVERLAY_HEIGHT_PERCENT: u16 = 40;

pub mod prefixes {
    pub const CLAUDE: &str = "Claude >";
    pub const USER: &str = ">";
    pub const SYSTEM: &str = "System >";
    pub const ERROR: &str = "Error >";
    pub const ASR: &str = "[ASR]";
    pub const PLAN: &str = "[PLAN]";
    pub const EXEC: &str = "[EXEC]";
    pub const WARN: &str = "[WARN]";
    pub const UTTERANCE: &str = "[UTT]";
}