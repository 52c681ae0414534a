use anyhow::bail;
use chrono::{FixedOffset, LocalResult, TimeZone, Utc};
use clap::{Parser, Subcommand};
use zipcast_core::{Config, LocationStore, Lookup, OwmClient, WeatherLookup};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "zipcast", version, about = "Zip-code weather lookup")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store your OpenWeatherMap API key.
    Configure,

    /// Show the forecast for a zip code or a coordinate pair.
    Show {
        /// Zip code, e.g. "90210".
        zip: Option<String>,

        /// Latitude in decimal degrees (requires --lon).
        #[arg(long, requires = "lon", conflicts_with = "zip")]
        lat: Option<f64>,

        /// Longitude in decimal degrees (requires --lat).
        #[arg(long, requires = "lat", conflicts_with = "zip")]
        lon: Option<f64>,

        /// Country code for the zip lookup; defaults to the configured one.
        #[arg(long)]
        country: Option<String>,
    },

    /// List previously searched locations.
    Saved {
        /// Only favorites, ordered by name.
        #[arg(long)]
        favorites: bool,
    },

    /// Mark or unmark a saved location as favorite.
    Favorite {
        zip: String,

        /// Remove the favorite mark instead of setting it.
        #[arg(long)]
        remove: bool,
    },

    /// Remove a saved location.
    Remove { zip: String },

    /// Remove saved locations. Favorites are kept unless --all is given.
    Clear {
        #[arg(long)]
        all: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show {
                zip,
                lat,
                lon,
                country,
            } => show(zip, lat, lon, country).await,
            Command::Saved { favorites } => saved(favorites).await,
            Command::Favorite { zip, remove } => {
                let store = open_store().await?;
                store.set_favorite(&zip, !remove).await?;
                if remove {
                    println!("Removed favorite mark from {zip}.");
                } else {
                    println!("Marked {zip} as favorite.");
                }
                Ok(())
            }
            Command::Remove { zip } => {
                let store = open_store().await?;
                store.delete_by_zip(&zip).await?;
                println!("Removed {zip}.");
                Ok(())
            }
            Command::Clear { all } => {
                let store = open_store().await?;
                let before = store.count().await?;
                if all {
                    store.delete_all().await?;
                } else {
                    store.delete_non_favorites().await?;
                }
                let after = store.count().await?;
                println!("Removed {} location(s), {} kept.", before - after, after);
                Ok(())
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()?;

    config.set_api_key(api_key);
    config.save()?;

    println!("Saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn open_store() -> anyhow::Result<LocationStore> {
    let config = Config::load()?;
    let store = LocationStore::open(&config.database_url()?).await?;
    Ok(store)
}

async fn show(
    zip: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    country: Option<String>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = OwmClient::new(config.api_key()?.to_owned(), config.timeout_secs())?;
    let store = LocationStore::open(&config.database_url()?).await?;
    let lookup = WeatherLookup::new(client, store);

    let result = match (zip, lat, lon) {
        (Some(zip), _, _) => {
            let country = country.as_deref().unwrap_or_else(|| config.country_code());
            lookup.by_zip(&zip, country).await?
        }
        (None, Some(lat), Some(lon)) => {
            lookup
                .by_coordinates(lat, lon, &format!("{lat:.2}, {lon:.2}"))
                .await?
        }
        _ => bail!(
            "Nothing to look up.\n\
             Hint: pass a zip code (`zipcast show 90210`) or coordinates \
             (`zipcast show --lat 47.61 --lon -122.33`)."
        ),
    };

    print_lookup(&result);
    Ok(())
}

async fn saved(favorites: bool) -> anyhow::Result<()> {
    let store = open_store().await?;
    let rows = if favorites {
        store.get_favorites().await?
    } else {
        store.get_all().await?
    };

    if rows.is_empty() {
        println!("No saved locations.");
        return Ok(());
    }

    for row in rows {
        let marker = if row.favorite { "*" } else { " " };
        let searched = match Utc.timestamp_millis_opt(row.searched_at) {
            LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            _ => "unknown".to_string(),
        };
        println!(
            "{marker} {:<6} {:<24} {}  last searched {}",
            row.zip, row.name, row.country, searched
        );
    }
    Ok(())
}

fn print_lookup(lookup: &Lookup) {
    let loc = &lookup.location;
    let snapshot = &lookup.snapshot;

    if loc.zip.is_empty() {
        println!("{}", loc.name);
    } else {
        println!("{}, {} ({})", loc.name, loc.country, loc.zip);
    }

    if let Some(current) = &snapshot.current {
        let condition = snapshot.current_condition().unwrap_or("unknown");
        println!(
            "  {condition}, {:.1}°F (feels like {:.1}°F)",
            current.temp, current.feels_like
        );
        println!(
            "  humidity {}%  wind {:.1} mph  UV {:.1}",
            current.humidity, current.wind_speed, current.uvi
        );
        println!(
            "  sunrise {}  sunset {}",
            local_time(current.sunrise, snapshot.timezone_offset),
            local_time(current.sunset, snapshot.timezone_offset)
        );
    }

    if !snapshot.daily.is_empty() {
        println!("Forecast:");
        for day in snapshot.daily.iter().take(5) {
            let label = local_date(day.dt, snapshot.timezone_offset);
            let condition = day
                .weather
                .first()
                .map(|w| w.description.as_str())
                .unwrap_or("unknown");
            println!(
                "  {label}  {:>5.1}°F to {:<5.1}°F  {condition}, rain {:.0}%",
                day.temp.min,
                day.temp.max,
                day.pop * 100.0
            );
        }
    }
}

fn local_time(epoch_secs: i64, offset_secs: i64) -> String {
    format_local(epoch_secs, offset_secs, "%H:%M")
}

fn local_date(epoch_secs: i64, offset_secs: i64) -> String {
    format_local(epoch_secs, offset_secs, "%a %m/%d")
}

fn format_local(epoch_secs: i64, offset_secs: i64, fmt: &str) -> String {
    let offset = FixedOffset::east_opt(offset_secs as i32).or_else(|| FixedOffset::east_opt(0));
    let (Some(offset), LocalResult::Single(dt)) = (offset, Utc.timestamp_opt(epoch_secs, 0))
    else {
        return "--".to_string();
    };
    dt.with_timezone(&offset).format(fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_local_applies_the_offset() {
        // 2023-11-14 22:13:20 UTC at UTC-7 is 15:13.
        assert_eq!(format_local(1_700_000_000, -25_200, "%H:%M"), "15:13");
    }

    #[test]
    fn format_local_handles_out_of_range_offsets() {
        assert_eq!(format_local(1_700_000_000, 999_999, "%H:%M"), "22:13");
    }
}
