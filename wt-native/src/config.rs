use std::path::PathBuf;

use clap::Parser;
use figment::{
	providers::{Env, Format, Serialized, Toml},
	Figment,
};
use serde::{Deserialize, Serialize};
use serde_with::DisplayFromStr;
use wt_server::proto::FrameDecoder;
use wt_server::{Admission, ConnectionConfig, DEFAULT_WORKERS};

use crate::Log;

#[serde_with::serde_as]
#[derive(Parser, Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
	/// Path to a TOML config file
	#[arg(long)]
	pub config: Option<PathBuf>,

	/// The number of workers running message handlers.
	#[arg(long, default_value_t = DEFAULT_WORKERS)]
	pub workers: usize,

	/// Require streams to be announced before they're attached to a session: open or announced.
	#[serde_as(as = "DisplayFromStr")]
	#[arg(long, default_value_t = Admission::Open)]
	pub admission: Admission,

	/// The largest frame accepted on a raw WebTransport stream, in bytes.
	#[arg(long, default_value_t = FrameDecoder::MAX_SIZE)]
	pub max_frame_size: u64,

	/// Log configuration.
	#[clap(flatten)]
	pub log: Log,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			config: None,
			workers: DEFAULT_WORKERS,
			admission: Admission::default(),
			max_frame_size: FrameDecoder::MAX_SIZE,
			log: Log::default(),
		}
	}
}

impl Config {
	/// Parse the command line, layer the config file and `WT_` environment on top, then start logging.
	pub fn load() -> anyhow::Result<Self> {
		let args = Config::parse();

		let config = Self::extract(args)?;
		config.log.init()?;

		tracing::debug!(?config, "loaded config");
		Ok(config)
	}

	/// Layer the config file and environment over the given arguments.
	///
	/// Nested fields use a double underscore, for example `WT_LOG__LEVEL`.
	pub fn extract(args: Config) -> Result<Self, figment::Error> {
		let mut figment = Figment::new().merge(Serialized::defaults(&args));
		if let Some(config) = &args.config {
			figment = figment.merge(Toml::file(config));
		}

		figment.merge(Env::prefixed("WT_").split("__")).extract()
	}

	pub fn connection(&self) -> ConnectionConfig {
		ConnectionConfig {
			admission: self.admission,
			max_frame_size: self.max_frame_size,
		}
	}
}
