//! Output formatting for the CLI.

use crate::cli::OutputFormat;
use colored::*;
use georoute_domain::{Region, RoutingDecision};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a routing decision.
    pub fn decision(&self, decision: &RoutingDecision) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "region": decision.region,
                "endpoint": decision.endpoint,
                "distance_km": decision.distance_km,
                "latency_ms": decision.latency_ms,
                "reason": decision.reason.as_str(),
            })),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                builder.push_record(["Region", decision.region.as_str()]);
                builder.push_record(["Endpoint", decision.endpoint.as_str()]);
                builder.push_record(["Distance", &format!("{:.1} km", decision.distance_km)]);
                builder.push_record(["Latency", &format_latency(decision.latency_ms)]);
                builder.push_record(["Reason", decision.reason.as_str()]);
                Ok(self.render(builder))
            }
        }
    }

    /// Format the region status list.
    pub fn regions(&self, regions: &[Region]) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json_regions: Vec<serde_json::Value> = regions
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "id": r.id,
                            "name": r.name,
                            "endpoint": r.endpoint,
                            "location": {
                                "latitude": r.location.latitude,
                                "longitude": r.location.longitude,
                                "country_code": r.location.country_code,
                            },
                            "weight": r.weight,
                            "healthy": r.healthy,
                            "latency_ms": r.latency_ms,
                            "last_check": r.last_check,
                        })
                    })
                    .collect();
                serde_json::to_string_pretty(&json_regions)
            }
            OutputFormat::Table => {
                if regions.is_empty() {
                    return Ok(self.warning("No regions registered."));
                }

                let mut builder = Builder::default();
                builder.push_record(["ID", "Name", "Endpoint", "Country", "Weight", "Health", "Latency"]);
                for r in regions {
                    let health = if r.healthy {
                        self.colorize("healthy", "green")
                    } else {
                        self.colorize("unhealthy", "red")
                    };
                    builder.push_record([
                        r.id.as_str(),
                        r.name.as_str(),
                        r.endpoint.as_str(),
                        r.location.country_code.as_str(),
                        &r.weight.to_string(),
                        &health,
                        &format_latency(r.latency_ms),
                    ]);
                }
                Ok(self.render(builder))
            }
        }
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn render(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn format_latency(latency_ms: u64) -> String {
    if latency_ms == 0 {
        "unknown".to_string()
    } else {
        format!("{} ms", latency_ms)
    }
}
