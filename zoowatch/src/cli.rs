use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, Parser};
use zoowatch::config::{AlertKind, Credentials, Overrides};

#[derive(Parser, Debug)]
#[command(name = "zoowatch")]
#[command(author, version, about = "Watch a zoo live stream and get an alert when the animal shows up")]
#[command(
    long_about = "Resolves a live stream, runs a YOLO object detector over sampled frames and \
                  sends an alert (console, SMS or push) when the target class is seen, \
                  at most once per cooldown window."
)]
pub struct Args {
    /// Direct stream URL; takes precedence over --stream
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Channel handle to watch (default: ZoodioThailand)
    #[arg(long, value_name = "HANDLE")]
    pub stream: Option<String>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Class label that triggers an alert
    #[arg(long)]
    pub target_class: Option<String>,

    /// Minimum detection confidence, 0 to 1
    #[arg(long)]
    pub min_confidence: Option<f32>,

    /// Seconds between two alerts
    #[arg(long, value_name = "SECS")]
    pub alert_cooldown: Option<u64>,

    /// Where alerts go
    #[arg(long, value_enum)]
    pub alert_type: Option<AlertKind>,

    #[arg(long, env = "TWILIO_ACCOUNT_SID", hide_env_values = true)]
    pub twilio_sid: Option<String>,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    pub twilio_token: Option<String>,

    /// Sending phone number
    #[arg(long, env = "TWILIO_FROM_NUMBER")]
    pub twilio_from: Option<String>,

    /// Phone number to alert
    #[arg(long, env = "TWILIO_TO_NUMBER")]
    pub twilio_to: Option<String>,

    #[arg(long, env = "PUSHBULLET_API_KEY", hide_env_values = true)]
    pub pushbullet_key: Option<String>,

    /// ONNX detection model
    #[arg(long, value_name = "ONNX")]
    pub model: Option<PathBuf>,

    /// Labels file, one class name per line
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Errors only
    #[arg(short, long, conflicts_with = "debug")]
    pub quiet: bool,

    /// Also write daily rolling log files here
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

type CredentialField = fn(&mut Credentials) -> &mut Option<String>;

impl Args {
    /// Overrides for the loaded config. `matches` tells flag credentials
    /// apart from ones clap read out of the environment.
    pub fn overrides(&self, matches: &ArgMatches) -> Overrides {
        let mut credentials = Credentials::default();
        let mut env_credentials = Credentials::default();
        let mut sort = |id: &str, value: &Option<String>, field: CredentialField| {
            let target = if matches.value_source(id) == Some(ValueSource::EnvVariable) {
                &mut env_credentials
            } else {
                &mut credentials
            };
            *field(target) = value.clone();
        };
        sort("twilio_sid", &self.twilio_sid, |c| &mut c.twilio_account_sid);
        sort("twilio_token", &self.twilio_token, |c| &mut c.twilio_auth_token);
        sort("twilio_from", &self.twilio_from, |c| &mut c.twilio_from_number);
        sort("twilio_to", &self.twilio_to, |c| &mut c.twilio_to_number);
        sort("pushbullet_key", &self.pushbullet_key, |c| &mut c.pushbullet_api_key);

        Overrides {
            stream: self.url.clone().or_else(|| self.stream.clone()),
            target_class: self.target_class.clone(),
            min_confidence: self.min_confidence,
            alert_cooldown_secs: self.alert_cooldown,
            alert_type: self.alert_type,
            credentials,
            env_credentials,
            model_path: self.model.clone(),
            labels_path: self.labels.clone(),
        }
    }
}
