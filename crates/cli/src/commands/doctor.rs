use std::path::Path;

use landlord_core::config::{AppConfig, LlmProvider, LoadOptions, ResourcesConfig};
use landlord_core::resources::{
    ResourceProvider, ADDRESS_MAP_FILE, PROPERTY_TYPE_MAP_FILE, SUBDISTRICT_CODE_MAP_FILE,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> (bool, String) {
    let report = build_report(options);
    let passed = report.overall_status == CheckStatus::Pass;

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (passed, output);
    }

    (passed, render_human(&report))
}

/// Unset artefact paths are skipped, not failed: the assistant runs degraded without them.
pub fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_completion_credentials(&config));
            checks.extend(check_artefacts(&config.resources));
            checks.push(check_resource_loading(&config.resources));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["completion_credentials", "resource_loading"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_completion_credentials(config: &AppConfig) -> DoctorCheck {
    let name = "completion_credentials";
    match (config.llm.provider, config.llm.api_key.is_some()) {
        (LlmProvider::Ollama, _) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!(
                "ollama needs no api key (endpoint `{}`)",
                config.llm.base_url.as_deref().unwrap_or("default")
            ),
        },
        (provider, true) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("{} api key configured", provider.as_str()),
        },
        (provider, false) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("{} requires llm.api_key", provider.as_str()),
        },
    }
}

fn check_artefacts(resources: &ResourcesConfig) -> Vec<DoctorCheck> {
    let lookup_files = resources.lookup_dir.as_ref().map(|dir| {
        [ADDRESS_MAP_FILE, SUBDISTRICT_CODE_MAP_FILE, PROPERTY_TYPE_MAP_FILE]
            .map(|file| dir.join(file))
    });

    let mut checks = vec![
        file_check("rent_model", resources.rent_model_path.as_deref()),
        file_check("maintenance_model", resources.maintenance_model_path.as_deref()),
        file_check("listings", resources.listings_path.as_deref()),
    ];
    checks.push(match lookup_files {
        None => DoctorCheck {
            name: "lookup_tables",
            status: CheckStatus::Skipped,
            details: "resources.lookup_dir is unset".to_string(),
        },
        Some(files) => {
            let missing: Vec<String> = files
                .iter()
                .filter(|file| !file.is_file())
                .map(|file| file.display().to_string())
                .collect();
            if missing.is_empty() {
                DoctorCheck {
                    name: "lookup_tables",
                    status: CheckStatus::Pass,
                    details: "all lookup tables present".to_string(),
                }
            } else {
                DoctorCheck {
                    name: "lookup_tables",
                    status: CheckStatus::Fail,
                    details: format!("missing: {}", missing.join(", ")),
                }
            }
        }
    });
    checks
}

fn file_check(name: &'static str, path: Option<&Path>) -> DoctorCheck {
    match path {
        None => DoctorCheck {
            name,
            status: CheckStatus::Skipped,
            details: "path is unset; this computation will be unavailable".to_string(),
        },
        Some(path) if path.is_file() => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("found `{}`", path.display()),
        },
        Some(path) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{}` does not exist", path.display()),
        },
    }
}

fn check_resource_loading(resources: &ResourcesConfig) -> DoctorCheck {
    let name = "resource_loading";
    match ResourceProvider::load(resources) {
        Ok(provider) => {
            let readiness = provider.readiness();
            DoctorCheck {
                name,
                status: CheckStatus::Pass,
                details: format!(
                    "rent_model={} maintenance_model={} lookup_tables={} listings={}",
                    readiness.rent_model,
                    readiness.maintenance_model,
                    readiness.lookup_tables,
                    readiness.listings
                ),
            }
        }
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
