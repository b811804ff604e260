use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Upload {
        path: PathBuf,
        name: Option<String>,
        fact_type: Option<String>,
    },
    Datasets {
        page: usize,
    },
    Scenarios,
    Run {
        scenario_ids: Vec<String>,
    },
    Watch {
        simulation_id: String,
    },
    Unwatch {
        simulation_id: String,
    },
    Reconnect {
        simulation_id: String,
    },
    Cancel {
        simulation_id: String,
    },
    Coverage,
    Help,
    Quit,
    Unknown(String),
}

impl FromStr for AppCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(AppCommand::Unknown("".to_string()));
        }

        let simulation_id = |usage: &str| match parts.get(1) {
            Some(id) => Ok(id.to_string()),
            None => Err(AppCommand::Unknown(format!("用法: {} <simulation_id>", usage))),
        };

        match parts[0] {
            "upload" => match parts.get(1) {
                Some(path) => Ok(AppCommand::Upload {
                    path: PathBuf::from(path),
                    name: parts.get(2).map(|s| s.to_string()),
                    fact_type: parts.get(3).map(|s| s.to_string()),
                }),
                None => Ok(AppCommand::Unknown(
                    "用法: upload <path> [name] [fact_type]".to_string(),
                )),
            },
            "datasets" => {
                let page = parts
                    .get(1)
                    .and_then(|s| s.parse::<usize>().ok())
                    .filter(|p| *p > 0)
                    .unwrap_or(1);
                Ok(AppCommand::Datasets { page })
            }
            "scenarios" => Ok(AppCommand::Scenarios),
            "run" => {
                if parts.len() > 1 {
                    Ok(AppCommand::Run {
                        scenario_ids: parts[1..].iter().map(|s| s.to_string()).collect(),
                    })
                } else {
                    Ok(AppCommand::Unknown(
                        "用法: run <scenario_id> [scenario_id...]".to_string(),
                    ))
                }
            }
            "watch" => Ok(simulation_id("watch")
                .map(|simulation_id| AppCommand::Watch { simulation_id })
                .unwrap_or_else(|usage| usage)),
            "unwatch" => Ok(simulation_id("unwatch")
                .map(|simulation_id| AppCommand::Unwatch { simulation_id })
                .unwrap_or_else(|usage| usage)),
            "reconnect" => Ok(simulation_id("reconnect")
                .map(|simulation_id| AppCommand::Reconnect { simulation_id })
                .unwrap_or_else(|usage| usage)),
            "cancel" => Ok(simulation_id("cancel")
                .map(|simulation_id| AppCommand::Cancel { simulation_id })
                .unwrap_or_else(|usage| usage)),
            "coverage" => Ok(AppCommand::Coverage),
            "help" | "?" => Ok(AppCommand::Help),
            "quit" | "exit" | "q" => Ok(AppCommand::Quit),
            other => Ok(AppCommand::Unknown(format!("未知命令: {}", other))),
        }
    }
}

pub fn help_text() -> &'static str {
    "命令:
  upload <path> [name] [fact_type]   解析并上传数据集 (csv/json/xlsx)
  datasets [page]                    分页列出数据集
  scenarios                          列出场景
  run <scenario_id>...               启动模拟并订阅实时进度
  watch <simulation_id>              订阅模拟实时进度
  unwatch <simulation_id>            取消订阅
  reconnect <simulation_id>          手动重连实时通道
  cancel <simulation_id>             取消模拟
  coverage                           规则覆盖率
  help                               显示帮助
  quit                               退出"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> AppCommand {
        s.parse().unwrap()
    }

    #[test]
    fn parses_upload_with_optional_parts() {
        assert_eq!(
            parse("upload data/people.csv People Person"),
            AppCommand::Upload {
                path: PathBuf::from("data/people.csv"),
                name: Some("People".to_string()),
                fact_type: Some("Person".to_string()),
            }
        );
        assert_eq!(
            parse("upload a.json"),
            AppCommand::Upload {
                path: PathBuf::from("a.json"),
                name: None,
                fact_type: None,
            }
        );
        assert!(matches!(parse("upload"), AppCommand::Unknown(m) if m.contains("upload <path>")));
    }

    #[test]
    fn datasets_page_defaults_to_first() {
        assert_eq!(parse("datasets"), AppCommand::Datasets { page: 1 });
        assert_eq!(parse("datasets 3"), AppCommand::Datasets { page: 3 });
        assert_eq!(parse("datasets 0"), AppCommand::Datasets { page: 1 });
    }

    #[test]
    fn parses_simulation_commands() {
        assert_eq!(
            parse("run s1 s2"),
            AppCommand::Run {
                scenario_ids: vec!["s1".to_string(), "s2".to_string()]
            }
        );
        assert_eq!(
            parse("watch sim-9"),
            AppCommand::Watch {
                simulation_id: "sim-9".to_string()
            }
        );
        assert!(matches!(parse("cancel"), AppCommand::Unknown(m) if m.contains("cancel <simulation_id>")));
        assert!(matches!(parse("run"), AppCommand::Unknown(_)));
    }

    #[test]
    fn unknown_and_blank_input() {
        assert_eq!(parse("   "), AppCommand::Unknown(String::new()));
        assert_eq!(parse("frobnicate"), AppCommand::Unknown("未知命令: frobnicate".to_string()));
        assert_eq!(parse("q"), AppCommand::Quit);
    }
}
