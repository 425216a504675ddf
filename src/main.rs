use std::sync::Arc;

use noise_bridge::audio::{AlsaBackend, AudioGraphController};
use noise_bridge::engine::{NativeEngine, ProcessingEngine, SimulatedEngine};
use noise_bridge::{Config, EngineKind, EventLog, ParameterStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

// 控制面命令
#[derive(Debug, PartialEq)]
enum Command {
    Start,
    Stop,
    Noise(f32),
    Status,
    Log,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or_default().to_ascii_lowercase();
        match cmd.as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "noise" => {
                let arg = parts.next().ok_or("usage: noise <0.0..1.0>")?;
                arg.parse::<f32>()
                    .map(Command::Noise)
                    .map_err(|_| format!("invalid noise level: {}", arg))
            }
            "status" => Ok(Command::Status),
            "log" => Ok(Command::Log),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command: {} (try `help`)", other)),
        }
    }
}

const HELP: &str = "commands: start | stop | noise <0..1> | status | log | help | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().unwrap_or_default();

    let engine: Arc<dyn ProcessingEngine> = match config.engine {
        EngineKind::Native => Arc::new(NativeEngine),
        EngineKind::Simulated => Arc::new(SimulatedEngine::new()),
    };
    let params = Arc::new(ParameterStore::new(config.initial_noise_level));
    let events = Arc::new(EventLog::new(config.event_log_capacity));

    let mut controller = AudioGraphController::new(
        Box::new(AlsaBackend::new(config.audio())),
        engine,
        params,
        events.clone(),
        config.queue_depth,
    );

    events.push(format!(
        "{} {} ready (engine: {}, noise {:.3})",
        config.app_name,
        config.app_version,
        engine_name(config.engine),
        controller.params().snapshot(),
    ));
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                println!("Received Ctrl+C, shutting down...");
                break;
            }

            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match Command::parse(&line) {
                    Ok(Command::Start) => {
                        // start/stop join audio threads; keep them off the async workers
                        if let Err(e) = tokio::task::block_in_place(|| controller.start()) {
                            eprintln!("{}", e);
                        }
                    }
                    Ok(Command::Stop) => tokio::task::block_in_place(|| controller.stop()),
                    Ok(Command::Noise(level)) => {
                        let level = controller.set_noise_level(level);
                        println!("noise level: {:.3}", level);
                    }
                    Ok(Command::Status) => match serde_json::to_string_pretty(&controller.status()) {
                        Ok(json) => println!("{}", json),
                        Err(e) => eprintln!("Failed to encode status: {}", e),
                    },
                    Ok(Command::Log) => {
                        for entry in events.entries() {
                            println!("{}", entry);
                        }
                    }
                    Ok(Command::Help) => println!("{}", HELP),
                    Ok(Command::Quit) => break,
                    Err(msg) => eprintln!("{}", msg),
                }
            }
        }
    }

    tokio::task::block_in_place(|| controller.stop());
    Ok(())
}

fn engine_name(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Native => "native",
        EngineKind::Simulated => "simulated",
    }
}
