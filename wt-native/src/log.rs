use serde::{Deserialize, Serialize};
use serde_with::DisplayFromStr;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[serde_with::serde_as]
#[derive(Clone, clap::Parser, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
	/// The level filter to use.
	#[serde_as(as = "DisplayFromStr")]
	#[arg(id = "log-level", long = "log-level", default_value = "info")]
	pub level: Level,
}

impl Default for Log {
	fn default() -> Self {
		Self { level: Level::INFO }
	}
}

impl Log {
	pub fn level(&self) -> LevelFilter {
		LevelFilter::from_level(self.level)
	}

	/// Install a global subscriber writing to stderr.
	///
	/// `RUST_LOG` overrides the configured level.
	/// Fails if a global subscriber is already installed.
	pub fn init(&self) -> anyhow::Result<()> {
		let filter = EnvFilter::builder()
			.with_default_directive(self.level().into())
			.from_env_lossy()
			.add_directive("tracing::span=off".parse()?)
			.add_directive("tracing::span::active=off".parse()?);

		let logger = tracing_subscriber::FmtSubscriber::builder()
			.with_writer(std::io::stderr)
			.with_env_filter(filter)
			.finish();

		tracing::subscriber::set_global_default(logger)?;
		Ok(())
	}
}
