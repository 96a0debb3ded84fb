/*
 * @Date         : 2026-03-14
 * @Description  : 训练指标的输出端。写入失败只记日志，不影响训练
 */

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("写入指标失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("指标序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait MetricsSink {
    fn record(&mut self, step: u64, name: &str, value: f64) -> Result<(), MetricsError>;

    fn flush(&mut self) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// 记录一个指标，失败时只打印警告
pub fn record_or_warn(sink: &mut dyn MetricsSink, step: u64, name: &str, value: f64) {
    if let Err(e) = sink.record(step, name, value) {
        warn!(step, name, error = %e, "指标写入失败，已忽略");
    }
}

/// 把指标当作日志事件输出
#[derive(Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&mut self, step: u64, name: &str, value: f64) -> Result<(), MetricsError> {
        info!(target: "metrics", step, name, value);
        Ok(())
    }
}

#[derive(Serialize)]
struct Record<'a> {
    step: u64,
    name: &'a str,
    value: f64,
}

/// 每条指标一行 JSON，追加写入文件
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MetricsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl MetricsSink for JsonlSink {
    fn record(&mut self, step: u64, name: &str, value: f64) -> Result<(), MetricsError> {
        serde_json::to_writer(&mut self.writer, &Record { step, name, value })?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MetricsError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// 同时写入多个输出端
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn MetricsSink + Send>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn MetricsSink + Send>>) -> Self {
        Self { sinks }
    }
}

impl MetricsSink for FanoutSink {
    fn record(&mut self, step: u64, name: &str, value: f64) -> Result<(), MetricsError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.record(step, name, value) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&mut self) -> Result<(), MetricsError> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}
