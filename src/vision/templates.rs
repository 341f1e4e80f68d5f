// Template names, resolved by `TemplateLibrary` to `<name>.png` or `<name>-[x,y,w,h].png`

// Screen location markers
pub const HOME_MARKER: &str = "home_marker";
pub const WORLD_MARKER: &str = "world_marker";
pub const HOME_BUTTON: &str = "home_button";
pub const WORLD_BUTTON: &str = "world_button";
pub const CLOSE_BUTTON: &str = "close_button";

// Modal states
pub const RECONNECT_PROMPT: &str = "reconnect_prompt";
pub const RECONNECT_BUTTON: &str = "reconnect_button";
pub const EVENT_RUNNING: &str = "event_running";
pub const ALLIANCE_HELP: &str = "alliance_help";

// Stamina readout
pub const STAMINA_ICON: &str = "stamina_icon";

// Daily missions
pub const DAILY_MISSIONS_BUTTON: &str = "daily_missions_button";
pub const DAILY_MISSION_CLAIM: &str = "daily_mission_claim";

// Gathering
pub const SEARCH_BUTTON: &str = "search_button";
pub const GATHER_BUTTON: &str = "gather_button";
pub const MARCH_DEPLOY: &str = "march_deploy";

/// Search tab for a resource tile (`gather_tab_meat`, `gather_tab_wood`, ...).
pub fn gather_tab(resource: &str) -> String {
    format!("gather_tab_{resource}")
}

// Routine rewards
pub const ONLINE_REWARDS_CHEST: &str = "online_rewards_chest";
pub const MAIL_BUTTON: &str = "mail_button";
pub const MAIL_CLAIM_ALL: &str = "mail_claim_all";
pub const ALLIANCE_BUTTON: &str = "alliance_button";
pub const ALLIANCE_CHESTS_TAB: &str = "alliance_chests_tab";
pub const ALLIANCE_CHESTS_CLAIM: &str = "alliance_chests_claim";
pub const BARRACKS: &str = "barracks";
pub const TRAIN_BUTTON: &str = "train_button";
pub const INTEL_BUTTON: &str = "intel_button";
pub const INTEL_MISSION: &str = "intel_mission";
pub const INTEL_VIEW: &str = "intel_view";

/// Default match threshold for buttons and markers.
pub const DEFAULT_THRESHOLD: f32 = 0.90;
