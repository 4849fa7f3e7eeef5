use crate::config::{LoggingConfig, Section};
use crate::paths::resolve_under;
use std::{
    collections::HashMap,
    io::{IsTerminal, Write},
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Targets, fmt};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

fn parse_level(s: &str) -> LevelFilter {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" | "none" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// True if target == prefix or target starts with "prefix::".
fn matches_prefix(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .map(|rest| rest.is_empty() || rest.starts_with("::"))
        .unwrap_or(false)
}

// -------- rotating file writers --------

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

#[derive(Clone)]
struct FileHandle(Option<Rotating>);

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(rot) => rot
                .lock()
                .map_err(|_| std::io::Error::other("log writer poisoned"))?
                .write(buf),
            // No file for this target: drop.
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(rot) => rot
                .lock()
                .map_err(|_| std::io::Error::other("log writer poisoned"))?
                .flush(),
            None => Ok(()),
        }
    }
}

/// Routes each record to the file of the longest matching section prefix,
/// falling back to the `default` file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<Rotating>,
    by_prefix: Vec<(String, Rotating)>,
}

impl FileRouter {
    fn route(&self, target: &str) -> Option<Rotating> {
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| matches_prefix(target, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = FileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        FileHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileHandle(self.route(meta.target()))
    }
}

fn open_rotating(path: &Path, section: &Section) -> std::io::Result<Rotating> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let limit = match (section.max_backups, section.max_age_days) {
        (Some(n), _) => FileLimit::MaxFiles(n.max(1)),
        (None, Some(days)) => FileLimit::Age(chrono::Duration::days(i64::from(days))),
        (None, None) => FileLimit::Age(chrono::Duration::days(1)),
    };
    let max_bytes = section.max_size_mb.unwrap_or(100).saturating_mul(1024 * 1024);
    let rot = FileRotate::new(
        path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Mutex::new(rot)))
}

/// Console and file level filters plus the file router for one config.
struct Plan {
    console: Targets,
    file: Targets,
    router: FileRouter,
}

fn plan(cfg: &LoggingConfig, base_dir: &Path) -> Plan {
    let default = cfg.get("default");

    let mut console = Targets::new().with_default(
        default
            .map(|s| parse_level(&s.console_level))
            .unwrap_or(LevelFilter::OFF),
    );
    let mut file = Targets::new().with_default(LevelFilter::OFF);
    let mut router = FileRouter::default();
    let mut opened: HashMap<std::path::PathBuf, Rotating> = HashMap::new();

    let mut open = |section: &Section, name: &str| -> Option<Rotating> {
        if section.file.trim().is_empty() {
            return None;
        }
        let path = resolve_under(&section.file, base_dir);
        if let Some(w) = opened.get(&path) {
            return Some(w.clone());
        }
        match open_rotating(&path, section) {
            Ok(w) => {
                opened.insert(path, w.clone());
                Some(w)
            }
            Err(e) => {
                eprintln!(
                    "Failed to open log file '{}' for '{name}': {e}",
                    path.display()
                );
                None
            }
        }
    };

    if let Some(section) = default {
        if let Some(w) = open(section, "default") {
            file = file.with_default(parse_level(&section.file_level));
            router.default = Some(w);
        }
    }

    for (name, section) in cfg.iter().filter(|(k, _)| k.as_str() != "default") {
        console = console.with_target(name.clone(), parse_level(&section.console_level));
        match open(section, name) {
            Some(w) => {
                file = file.with_target(name.clone(), parse_level(&section.file_level));
                router.by_prefix.push((name.clone(), w));
            }
            // Keep this subsystem out of the default file too.
            None => file = file.with_target(name.clone(), LevelFilter::OFF),
        }
    }

    Plan {
        console,
        file,
        router,
    }
}

/// Install the global subscriber.
///
/// `base_dir` anchors relative log file paths (normally the app home dir).
/// Repeated calls are no-ops.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{layer::SubscriberExt, prelude::*, Registry};

    // Bridge `log` records (sqlx, lettre) into tracing.
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let Plan {
        console,
        file,
        router,
    } = plan(cfg, base_dir);

    let console_layer = fmt::layer()
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console);

    let file_layer = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(file)
    });

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

// =================== tests ===================
