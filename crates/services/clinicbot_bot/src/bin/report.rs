// --- File: crates/services/clinicbot_bot/src/bin/report.rs ---
//! Prints upcoming appointments from the booking store.

use chrono::Utc;
use chrono_tz::Tz;
use clap::Parser;
use clinicbot_bot::app::{open_repository, report_window};
use clinicbot_booking::{ContactPolicy, Presenter};
use clinicbot_common::error::{config_error, database_error, ClinicError};
use clinicbot_common::logging;
use clinicbot_config::{load_config, AppConfig};
use clinicbot_db::BookingRepository;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "clinicbot-report", about = "List appointments stored by the clinic bot")]
struct Cli {
    /// Print every stored booking, including past ones and bookings without an owner
    #[arg(long)]
    all: bool,

    /// Number of days to include, starting today
    #[arg(long, default_value_t = 7)]
    days: u32,
}

fn report_presenter(config: &AppConfig, time_zone: Tz) -> Result<Presenter, ClinicError> {
    let contact = ContactPolicy::from_config(&config.contact).map_err(config_error)?;
    Ok(Presenter::new(time_zone, contact))
}

#[tokio::main]
async fn main() -> Result<(), ClinicError> {
    let cli = Cli::parse();
    logging::init_with_level(Level::WARN);

    let config = load_config().map_err(config_error)?;
    config.validate_schedule().map_err(config_error)?;
    let time_zone = config.schedule.tz().map_err(config_error)?;

    let repository = open_repository(&config).await?;
    let bookings = if cli.all {
        repository.list_all().await
    } else {
        let (from, to) = report_window(Utc::now(), time_zone, cli.days);
        repository.list_in_range(from, to).await
    }
    .map_err(database_error)?;

    let presenter = report_presenter(&config, time_zone)?;
    for booking in &bookings {
        println!("{}", presenter.report_line(booking));
    }
    println!("{} booking(s)", bookings.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_a_week() {
        let cli = Cli::parse_from(["clinicbot-report"]);
        assert!(!cli.all);
        assert_eq!(cli.days, 7);
    }

    #[test]
    fn accepts_flags() {
        let cli = Cli::parse_from(["clinicbot-report", "--all", "--days", "3"]);
        assert!(cli.all);
        assert_eq!(cli.days, 3);
    }

    #[test]
    fn presenter_uses_the_configured_contact_format() {
        let mut config = AppConfig::default();
        config.contact.country_prefix = "+49".to_string();
        config.contact.digits = 11;

        let presenter = report_presenter(&config, chrono_tz::Europe::Berlin).unwrap();
        assert!(presenter.invalid_contact().text.contains("+49"));

        config.contact.country_prefix = "49".to_string();
        assert!(matches!(
            report_presenter(&config, chrono_tz::Europe::Berlin),
            Err(ClinicError::ConfigError(_))
        ));
    }
}
