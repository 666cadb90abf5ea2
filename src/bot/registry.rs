use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::bot::builtins::Builtins;
use crate::bot::handler::{Handler, HandlerKind};
use crate::bot::script::{is_script_file, load_script};
use crate::error::{HandlerLoadError, Result};
use crate::utils::{Logger, Validator};

#[derive(Clone)]
pub struct HandlerEntry {
    pub name: String,
    pub kind: HandlerKind,
    pub handler: Arc<dyn Handler>,
    pub source: Option<PathBuf>,
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

/// 一次目录扫描的结果
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub replaced: Vec<String>,
    pub skipped: Vec<HandlerLoadError>,
}

impl LoadReport {
    fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.replaced.extend(other.replaced);
        self.skipped.extend(other.skipped);
    }
}

/// 命令和事件两张表，启动后只读
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    commands: BTreeMap<String, HandlerEntry>,
    events: BTreeMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 扫描命令目录和事件目录
    pub fn load(
        commands_path: &Path,
        events_path: &Path,
        builtins: &Builtins,
    ) -> Result<(Self, LoadReport)> {
        let mut registry = Self::new();
        let mut report = registry.load_dir(commands_path, HandlerKind::Command, builtins)?;
        report.merge(registry.load_dir(events_path, HandlerKind::Event, builtins)?);

        info!(
            "📚 Registry ready: {} commands, {} event handlers, {} skipped",
            registry.commands.len(),
            registry.events.len(),
            report.skipped.len()
        );

        Ok((registry, report))
    }

    /// 加载目录下的处理器模块，单个文件失败只会被跳过
    pub fn load_dir(
        &mut self,
        dir: &Path,
        kind: HandlerKind,
        builtins: &Builtins,
    ) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} directory {} not found, nothing loaded", kind, dir.display());
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_script_file(&path) {
                paths.push(path);
            }
        }
        // read_dir 的顺序不固定，按文件名排序保证“后加载者胜出”可预期
        paths.sort();

        for path in paths {
            match self.load_file(&path, kind, builtins) {
                Ok((name, replaced)) => {
                    if replaced {
                        Logger::log_handler_replaced(kind, &name, &path);
                        report.replaced.push(name.clone());
                    }
                    report.loaded.push(name);
                }
                Err(e) => {
                    Logger::log_handler_skipped(kind, &e);
                    report.skipped.push(e);
                }
            }
        }

        Ok(report)
    }

    fn load_file(
        &mut self,
        path: &Path,
        kind: HandlerKind,
        builtins: &Builtins,
    ) -> std::result::Result<(String, bool), HandlerLoadError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| Validator::is_valid_handler_name(s))
            .ok_or_else(|| HandlerLoadError::InvalidName {
                path: path.to_path_buf(),
            })?
            .to_string();

        let start_time = Instant::now();
        let handler = load_script(path, builtins)?;
        // 事件处理器拿到的参数总是空的
        if kind == HandlerKind::Event && handler.min_args() > 0 {
            return Err(HandlerLoadError::Invalid {
                path: path.to_path_buf(),
                message: "event handlers receive no arguments, `min_args` must be 0".to_string(),
            });
        }
        Logger::log_handler_loaded(kind, &name, start_time.elapsed());

        let entry = HandlerEntry {
            name: name.clone(),
            kind,
            handler: Arc::new(handler),
            source: Some(path.to_path_buf()),
        };
        let replaced = self.insert(entry).is_some();

        Ok((name, replaced))
    }

    /// 直接注册一个编译好的处理器，同名时覆盖并返回旧的
    pub fn register(
        &mut self,
        name: impl Into<String>,
        kind: HandlerKind,
        handler: Arc<dyn Handler>,
    ) -> Option<HandlerEntry> {
        self.insert(HandlerEntry {
            name: name.into(),
            kind,
            handler,
            source: None,
        })
    }

    fn insert(&mut self, entry: HandlerEntry) -> Option<HandlerEntry> {
        let table = match entry.kind {
            HandlerKind::Command => &mut self.commands,
            HandlerKind::Event => &mut self.events,
        };
        table.insert(entry.name.clone(), entry)
    }

    pub fn command(&self, name: &str) -> Option<&HandlerEntry> {
        self.commands.get(name)
    }

    pub fn event(&self, name: &str) -> Option<&HandlerEntry> {
        self.events.get(name)
    }

    pub fn event_handlers(&self) -> impl Iterator<Item = &HandlerEntry> {
        self.events.values()
    }

    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn event_names(&self) -> Vec<&str> {
        self.events.keys().map(String::as_str).collect()
    }
}
