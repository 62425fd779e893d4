use {eyre::Report, std::path::PathBuf};

/// Naming conventions for bones generated by the switch core.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Names {
    /// Pattern for transaction proxies. `{bone_name}` expands to the
    /// source bone's name.
    pub copy_name: String,
    /// Name given to free-floating helper bones.
    pub empty_name: String,
}

impl Default for Names {
    fn default() -> Self {
        Names {
            copy_name: "{bone_name}_Copy".to_owned(),
            empty_name: "Empty".to_owned(),
        }
    }
}

impl Names {
    pub fn format_copy(&self, bone_name: &str) -> String {
        self.copy_name.replace("{bone_name}", bone_name)
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    pub names: Names,
}

impl Config {
    /// Loads configuration from `SPACESWITCH_CONFIG_PATH`, falling back to
    /// `./spaceswitch.ron`. A missing file yields the defaults; a present
    /// but malformed file is an error.
    pub fn load_default() -> Result<Self, Report> {
        let path = std::env::var("SPACESWITCH_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./spaceswitch.ron"));

        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load(path)
    }

    #[tracing::instrument]
    pub fn load(path: PathBuf) -> Result<Self, Report> {
        Ok(ron::de::from_reader(std::fs::File::open(&path)?)?)
    }
}
