/*
 * @Date         : 2026-03-12
 * @Description  : 检查点管理器
 */

use super::CheckpointError;
use crate::train::{RunConfig, TrainingState};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LATEST_MARKER: &str = "latest";
const CONFIG_FILE: &str = "config.json";

/// 要加载哪个检查点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointRef {
    Latest,
    Index(u64),
}

impl From<Option<u64>> for CheckpointRef {
    fn from(index: Option<u64>) -> Self {
        index.map_or(Self::Latest, Self::Index)
    }
}

/// 先写同目录下的临时文件并落盘，再重命名到`path`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_index(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("model_")?
        .strip_suffix(".bin")?
        .parse()
        .ok()
}

pub struct CheckpointManager {
    dir: PathBuf,
    keep_last: Option<usize>,
}

impl CheckpointManager {
    pub fn new(models_dir: impl AsRef<Path>, name: &str, keep_last: Option<usize>) -> Self {
        Self {
            dir: models_dir.as_ref().join(name),
            keep_last,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("model_{index}.bin"))
    }

    /// 保存训练状态为第`index`个检查点，并把`latest`指向已写出的最大序号
    pub fn save(&self, state: &TrainingState, index: u64) -> Result<PathBuf, CheckpointError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(index);
        let tmp = tmp_path(&path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(&mut writer, state)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        let latest = self.read_marker().map_or(index, |current| current.max(index));
        write_atomic(&self.dir.join(LATEST_MARKER), latest.to_string().as_bytes())?;
        debug!(index, step = state.step, path = %path.display(), "检查点已保存");

        self.rotate(latest)?;
        Ok(path)
    }

    /// 加载检查点，返回(序号, 训练状态)。解码在返回前全部完成
    pub fn load(&self, which: CheckpointRef) -> Result<(u64, TrainingState), CheckpointError> {
        let index = match which {
            CheckpointRef::Index(index) => index,
            CheckpointRef::Latest => self
                .latest_index()?
                .ok_or_else(|| CheckpointError::NoCheckpoint(self.dir.clone()))?,
        };
        let path = self.path(index);
        if !path.is_file() {
            return Err(CheckpointError::NotFound(path));
        }
        let reader = BufReader::new(File::open(&path)?);
        let state: TrainingState =
            bincode::deserialize_from(reader).map_err(|e| CheckpointError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        info!(index, step = state.step, "已加载检查点");
        Ok((index, state))
    }

    /// 最新的检查点序号：优先读`latest`，缺失或损坏时扫描目录
    pub fn latest_index(&self) -> Result<Option<u64>, CheckpointError> {
        if let Some(index) = self.read_marker() {
            if self.path(index).is_file() {
                return Ok(Some(index));
            }
            warn!(index, "`latest`指向的检查点不存在，改为扫描目录");
        }
        Ok(self.indices()?.last().copied())
    }

    /// 目录下所有检查点的序号（升序）
    pub fn indices(&self) -> Result<Vec<u64>, CheckpointError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut indices = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(parse_index) {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    fn read_marker(&self) -> Option<u64> {
        fs::read_to_string(self.dir.join(LATEST_MARKER))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// 只保留最近的`keep_last`个检查点，`latest`指向的那个永远保留
    fn rotate(&self, latest: u64) -> Result<(), CheckpointError> {
        let Some(keep) = self.keep_last else {
            return Ok(());
        };
        let indices = self.indices()?;
        if indices.len() <= keep {
            return Ok(());
        }
        let excess = indices.len() - keep;
        for index in indices.into_iter().filter(|&i| i != latest).take(excess) {
            fs::remove_file(self.path(index))?;
            debug!(index, "轮换删除旧检查点");
        }
        Ok(())
    }

    pub fn save_config(&self, config: &RunConfig) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.dir.join(CONFIG_FILE), json.as_bytes())?;
        Ok(())
    }

    /// 读取保存的运行配置，文件不存在时返回 None
    pub fn load_config(&self) -> Result<Option<RunConfig>, CheckpointError> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// 删除本次运行的全部检查点
    pub fn clear(&self) -> Result<(), CheckpointError> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
            info!(dir = %self.dir.display(), "已清空旧检查点");
        }
        Ok(())
    }
}
