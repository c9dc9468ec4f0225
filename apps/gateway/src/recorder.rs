//! 视频录制（fire-and-forget）
//!
//! 启动后与网关完全解耦：录制线程自行结束，失败只记录日志。

use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::time::Duration;
use tracing::{error, info};

/// 视频录制任务
pub trait VideoRecorder: Send + Sync {
    /// 在后台开始一次录制，立即返回
    fn start(&self);
}

/// 不录制
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl VideoRecorder for NoopRecorder {
    fn start(&self) {}
}

/// 调用 ffmpeg 录制视频流
#[derive(Debug, Clone)]
pub struct FfmpegRecorder {
    program: String,
    source: String,
    duration: Duration,
    output_dir: PathBuf,
}

impl FfmpegRecorder {
    pub fn new(
        program: impl Into<String>,
        source: impl Into<String>,
        duration: Duration,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            source: source.into(),
            duration,
            output_dir: output_dir.into(),
        }
    }

    /// 输出文件：`drone-YYYY-mm-dd-HH-MM-SS.mp4`
    pub fn output_path(&self, now: DateTime<Local>) -> PathBuf {
        self.output_dir
            .join(format!("drone-{}.mp4", now.format("%Y-%m-%d-%H-%M-%S")))
    }

    /// ffmpeg 参数
    pub fn args(&self, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            self.source.clone().into(),
            "-t".into(),
            self.duration.as_secs().to_string().into(),
            output.as_os_str().to_owned(),
        ]
    }

    fn run(&self, output: &Path) {
        info!("Recording video to {}", output.display());
        match ProcessCommand::new(&self.program).args(self.args(output)).output() {
            Ok(result) if result.status.success() => {
                info!("Video saved to {}", output.display());
            },
            Ok(result) => {
                let stderr = String::from_utf8_lossy(&result.stderr);
                error!(
                    "Error receiving video: {} exited with {}: {}",
                    self.program,
                    result.status,
                    stderr.lines().last().unwrap_or_default()
                );
            },
            Err(e) => error!("Error receiving video: failed to run {}: {}", self.program, e),
        }
    }
}

impl VideoRecorder for FfmpegRecorder {
    fn start(&self) {
        let recorder = self.clone();
        let output = self.output_path(Local::now());
        let spawned = std::thread::Builder::new()
            .name("tello-video".into())
            .spawn(move || recorder.run(&output));
        if let Err(e) = spawned {
            error!("Error receiving video: failed to spawn recorder thread: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn recorder() -> FfmpegRecorder {
        FfmpegRecorder::new(
            "ffmpeg",
            "udp://0.0.0.0:11111",
            Duration::from_secs(30),
            "/tmp/videos",
        )
    }

    #[test]
    fn test_output_path_uses_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            recorder().output_path(now),
            PathBuf::from("/tmp/videos/drone-2024-03-09-14-05-07.mp4")
        );
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = recorder().args(Path::new("out.mp4"));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-i", "udp://0.0.0.0:11111", "-t", "30", "out.mp4"]);
    }

    #[test]
    fn test_missing_program_does_not_panic() {
        let recorder = FfmpegRecorder::new(
            "definitely-not-a-real-ffmpeg",
            "udp://0.0.0.0:11111",
            Duration::from_secs(1),
            std::env::temp_dir(),
        );
        recorder.run(Path::new("unused.mp4"));
    }
}
