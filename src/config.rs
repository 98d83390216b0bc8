use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

/// Maps a secondary lens-model string onto the canonical lens name stored
/// when the camera did not report a lens id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensAlias {
    pub lens_model: String,
    pub canonical: String,
}

/// App config stored in `<home>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the temp/pictures/thumbs/halfres tree; relative paths resolve against home.
    pub storage_root: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub address: IpAddr,
    pub port: u16,
    pub upload_limit_mib: u64,
    pub thumb_size: (u32, u32),
    pub halfres_size: (u32, u32),
    /// `None` skips the external tool and reads EXIF in process.
    pub exif_tool: Option<String>,
    /// Capture year reported by a camera with a misconfigured clock.
    pub clock_fix_year: Option<i32>,
    pub lens_aliases: Vec<LensAlias>,
    pub month_locale: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: None,
            database_path: None,
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            upload_limit_mib: 64,
            thumb_size: (512, 512),
            halfres_size: (2048, 2048),
            exif_tool: Some("exiv2".to_string()),
            clock_fix_year: Some(2018),
            lens_aliases: vec![LensAlias {
                lens_model: "200.0-500.0 mm f/5.6".to_string(),
                canonical: "Nikon 200.0-500.0 mm f/5.6 ED VR".to_string(),
            }],
            month_locale: "fr_FR".to_string(),
        }
    }
}

impl Config {
    pub fn storage_root(&self, home: &Path) -> PathBuf {
        resolve(home, self.storage_root.as_deref(), "storage")
    }

    pub fn database_path(&self, home: &Path) -> PathBuf {
        resolve(home, self.database_path.as_deref(), "khazad.db")
    }
}

fn resolve(home: &Path, configured: Option<&Path>, default_name: &str) -> PathBuf {
    match configured {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => home.join(p),
        None => home.join(default_name),
    }
}

/// `$KHAZAD_HOME`, falling back to `~/.khazad`.
pub fn khazad_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("KHAZAD_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".khazad"))
}

pub fn read_config(home: &Path) -> Result<Config> {
    let path = home.join("config.json");
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(&path)?;
    match serde_json::from_str(&text) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!("malformed {:?}, using defaults: {}", path, e);
            Ok(Config::default())
        }
    }
}

/// Read the config, writing the defaults to `config.json` on first start so
/// there is a file to edit.
pub fn load_or_init_config(home: &Path) -> Result<Config> {
    let path = home.join("config.json");
    if path.exists() {
        return read_config(home);
    }
    let config = Config::default();
    write_config(home, &config).with_context(|| format!("cannot write {:?}", path))?;
    tracing::info!("wrote default config to {:?}", path);
    Ok(config)
}

pub fn write_config(home: &Path, config: &Config) -> Result<()> {
    std::fs::create_dir_all(home)?;
    let tmp = home.join("config.json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(config)?)?;
    std::fs::rename(&tmp, home.join("config.json"))?;
    Ok(())
}

pub fn append_operation_log(home: &Path, event: &str) {
    let log_dir = home.join("logs");
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    if let Ok(mut f) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("operation.log"))
    {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = writeln!(f, "[{}] {}", now, event);
    }
}
