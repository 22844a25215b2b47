mod settings;

pub use settings::{
    state_dir, AlertSettings, Command, Config, Settings, SinkSettings, SourceKind,
    SourceSettings, UiSettings,
};
