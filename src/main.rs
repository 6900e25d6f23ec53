use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use trackmood::acquire::{AudioAcquirer, Downloader, PreviewFetcher};
use trackmood::analyzer::{self, mood};
use trackmood::config::AppConfig;
use trackmood::db::Database;
use trackmood::db::models::{AnalysisReport, TrackFeatureRecord};
use trackmood::{export, sources, stats};

#[derive(Parser)]
#[command(name = "trackmood", version, about = "Estimate audio features and mood for playlist tracks")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a Spotify playlist's tracks to a track list
    Spotify {
        /// Playlist ID
        playlist_id: String,

        /// Output CSV
        #[arg(short, long, default_value = "spotify_tracks.csv")]
        output: PathBuf,

        /// Maximum number of tracks
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,

        /// Also write a plain name,artist track list
        #[arg(long)]
        track_list: Option<PathBuf>,
    },

    /// Download each track in a track list and estimate its features
    Analyze {
        /// Track list with name and artist columns
        input: PathBuf,

        /// Output feature table
        #[arg(short, long, default_value = "track_features.csv")]
        output: PathBuf,

        /// Also load the results into the database
        #[arg(long)]
        import: bool,
    },

    /// Stream a Deezer playlist's previews and estimate their features
    Deezer {
        /// Playlist ID (defaults to config)
        playlist_id: Option<String>,

        /// Output feature table
        #[arg(short, long, default_value = "deezer_features.csv")]
        output: PathBuf,

        /// Maximum number of tracks (defaults to config)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Don't keep preview clips in the cache directory
        #[arg(long)]
        no_cache: bool,

        /// Also load the results into the database
        #[arg(long)]
        import: bool,
    },

    /// Load a feature table into the database and clean it
    Import {
        /// Feature table (File or Preview_URL column)
        input: PathBuf,

        /// Empty the table before loading
        #[arg(long)]
        replace: bool,
    },

    /// Deduplicate, fill nulls, clamp tempo and fix mood labels
    Clean,

    /// Run the analysis queries
    Report {
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Export the cleaned table
    Export {
        /// Output CSV
        #[arg(short, long, default_value = "cleaned_tracks.csv")]
        output: PathBuf,
    },

    /// Feature summary and correlation matrix
    Stats,

    /// Group tracks by feature similarity (k-means)
    Cluster {
        /// Number of clusters
        #[arg(short, default_value_t = stats::DEFAULT_K)]
        k: usize,
    },

    /// Show the mood label for a valence/energy pair
    Classify {
        valence: f64,
        energy: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(trackmood::config::default_db_path);
    let open_db = || -> Result<Database> {
        log::info!("Database: {}", db_path.display());
        Database::open(&db_path).context("Failed to open database")
    };

    match cli.command {
        Commands::Spotify {
            playlist_id,
            output,
            limit,
            track_list,
        } => {
            let (id, secret) = config.spotify.credentials()?;
            let client = sources::spotify::SpotifyClient::connect(
                &id,
                &secret,
                config.acquisition.http_timeout_secs,
            )
            .context("Spotify authentication failed")?;
            let tracks = client
                .playlist_tracks(&playlist_id, limit)
                .context("Failed to fetch playlist")?;
            sources::spotify::write_tracks_csv(&output, &tracks)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Exported {} tracks to {}", tracks.len(), output.display());
            if let Some(path) = track_list {
                let refs: Vec<sources::TrackRef> = tracks.iter().map(Into::into).collect();
                sources::write_track_list(&path, &refs)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote track list to {}", path.display());
            }
        }

        Commands::Analyze {
            input,
            output,
            import,
        } => {
            let tracks = sources::read_track_list(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let acq = &config.acquisition;
            let downloader = Downloader::new(
                acq.downloader.clone(),
                config.resolve_cache_dir(),
                Duration::from_secs(acq.download_timeout_secs),
                acq.max_duration_secs,
            );
            let records = run_batch(&tracks, &downloader, &output)?;
            if import {
                import_records(&open_db()?, &records)?;
            }
        }

        Commands::Deezer {
            playlist_id,
            output,
            limit,
            no_cache,
            import,
        } => {
            let playlist_id = playlist_id.unwrap_or_else(|| config.deezer.playlist_id.clone());
            let limit = limit.unwrap_or(config.deezer.limit);
            let tracks = sources::deezer::playlist_tracks(
                &playlist_id,
                limit,
                config.acquisition.http_timeout_secs,
            )
            .context("Failed to fetch Deezer playlist")?;
            let cache = (!no_cache).then(|| config.resolve_cache_dir().join("previews"));
            let fetcher = PreviewFetcher::new(config.acquisition.http_timeout_secs, cache);
            let records = run_batch(&tracks, &fetcher, &output)?;
            if import {
                import_records(&open_db()?, &records)?;
            }
        }

        Commands::Import { input, replace } => {
            let mut rows = export::read_features_csv(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            rows.iter_mut().for_each(export::fold_row);

            let db = open_db()?;
            if replace {
                let removed = db.clear().context("Failed to clear table")?;
                println!("Removed {removed} existing rows");
            }
            let inserted = db.insert_rows(&rows).context("Import failed")?;
            println!("Imported {inserted} rows from {}", input.display());
            let report = db.clean().context("Cleaning failed")?;
            print_clean_report(&report);
        }

        Commands::Clean => {
            let report = open_db()?.clean().context("Cleaning failed")?;
            print_clean_report(&report);
        }

        Commands::Report { json } => {
            let report = open_db()?.analysis_report().context("Query failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_analysis_report(&report);
            }
        }

        Commands::Export { output } => {
            let rows = open_db()?.all_rows().context("Query failed")?;
            export::write_cleaned_csv(&output, &rows)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Exported {} rows to {}", rows.len(), output.display());
        }

        Commands::Stats => {
            let db = open_db()?;
            let library = db.stats().context("Query failed")?;
            println!("Library Statistics");
            println!("==================");
            println!("Total tracks:     {}", library.total_tracks);
            println!("Complete tracks:  {}", library.complete_tracks);
            println!("Artists:          {}", library.artists);
            println!();
            if !library.moods.is_empty() {
                println!("Moods:");
                for (label, count) in &library.moods {
                    println!("  {:<12} {}", label, count);
                }
                println!();
            }

            let records = db.all_records().context("Query failed")?;
            if records.is_empty() {
                println!("No complete tracks. Run `trackmood clean` first.");
                return Ok(());
            }
            print_summary(&stats::summarize(&records));
            println!();
            print_correlations(&stats::correlation_matrix(&records));
        }

        Commands::Cluster { k } => {
            let records = open_db()?.all_records().context("Query failed")?;
            if records.is_empty() {
                println!("No complete tracks to cluster.");
                return Ok(());
            }
            let clustering = stats::kmeans(&records, k);
            print_clusters(&records, &clustering);
        }

        Commands::Classify { valence, energy } => {
            let label = mood::classify(valence, energy);
            match mood::first_matching_rule(valence, energy) {
                Some(i) => println!("{label} (rule {}: {})", i + 1, mood::MOOD_RULES[i].name),
                None => println!("{label} (default)"),
            }
        }
    }

    Ok(())
}

/// Analyze a batch, write the feature table and report failures.
fn run_batch(
    tracks: &[sources::TrackRef],
    acquirer: &dyn AudioAcquirer,
    output: &Path,
) -> Result<Vec<TrackFeatureRecord>> {
    let report = analyzer::analyze_to_table(tracks, acquirer, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Analysis complete: {} analyzed, {} failed",
        report.analyzed(),
        report.failed()
    );
    for (track, err) in report.failures() {
        println!("  skipped {}: {}", track.label(), err);
    }
    println!("Wrote {}", output.display());
    Ok(report.records())
}

fn import_records(db: &Database, records: &[TrackFeatureRecord]) -> Result<()> {
    let inserted = db.insert_records(records).context("Import failed")?;
    println!("Imported {inserted} records");
    let report = db.clean().context("Cleaning failed")?;
    print_clean_report(&report);
    Ok(())
}

fn print_clean_report(report: &trackmood::db::models::CleanReport) {
    println!(
        "Cleaning: {} duplicates removed, {} rows null-filled, {} tempos clamped, {} moods coerced",
        report.duplicates_removed, report.nulls_filled, report.tempo_clamped, report.moods_coerced
    );
}

/// Truncate to `width` characters, marking the cut with "...".
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn print_track_table(records: &[TrackFeatureRecord]) {
    println!(
        "{:<28} {:<20} {:>5} {:>6} {:>6} {:>6}  {}",
        "Track", "Artist", "BPM", "Eng", "Dnc", "Val", "Mood"
    );
    println!("{}", "-".repeat(90));
    for r in records {
        println!(
            "{:<28} {:<20} {:>5.0} {:>6.3} {:>6.3} {:>6.3}  {}",
            fit(&r.name, 28),
            fit(&r.artist, 20),
            r.tempo_bpm,
            r.energy,
            r.danceability,
            r.valence_proxy,
            r.mood,
        );
    }
}

fn print_analysis_report(report: &AnalysisReport) {
    let avg = &report.averages;
    let show = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
    println!("Averages over {} tracks", avg.track_count);
    println!(
        "  tempo {}  energy {}  danceability {}  valence {}",
        show(avg.avg_tempo),
        show(avg.avg_energy),
        show(avg.avg_danceability),
        show(avg.avg_valence)
    );
    println!();

    println!("Top bangers (high energy and danceability):");
    if report.bangers.is_empty() {
        println!("  none");
    } else {
        print_track_table(&report.bangers);
    }
    println!();

    println!("Tempo buckets:");
    println!("{:>6} {:>7} {:>7}  {}", "BPM", "Tracks", "Dnc", "Moods");
    for b in &report.tempo_buckets {
        println!(
            "{:>6} {:>7} {:>7.3}  {}",
            b.tempo,
            b.track_count,
            b.avg_danceability,
            fit(&b.moods, 50)
        );
    }
    println!();

    println!("Top artists by energy:");
    for a in &report.top_artists {
        println!(
            "  {:<30} {:>3} tracks  energy {:.3}  [{}]",
            fit(&a.artist, 30),
            a.track_count,
            a.avg_energy,
            a.moods
        );
    }
    println!();

    println!("Tempo ranges:");
    for r in &report.tempo_ranges {
        println!(
            "  {:<16} {:>4} tracks  energy {:.3}  [{}]",
            r.range, r.track_count, r.avg_energy, r.moods
        );
    }
    println!();

    println!("Outliers (> mean + 2 std in energy or danceability):");
    if report.outliers.is_empty() {
        println!("  none");
    } else {
        print_track_table(&report.outliers);
    }
    println!();

    println!("Moods:");
    println!("  {:<12} {:>6} {:>6} {:>6} {:>6}", "Mood", "Tracks", "Eng", "Dnc", "Val");
    for m in &report.moods {
        println!(
            "  {:<12} {:>6} {:>6.3} {:>6.3} {:>6.3}",
            m.mood, m.track_count, m.avg_energy, m.avg_danceability, m.avg_valence
        );
    }
}

fn print_summary(summary: &[stats::FeatureSummary]) {
    println!(
        "{:<14} {:>6} {:>9} {:>9} {:>9} {:>9}",
        "Feature", "Count", "Mean", "Std", "Min", "Max"
    );
    println!("{}", "-".repeat(61));
    for s in summary {
        println!(
            "{:<14} {:>6} {:>9.3} {:>9.3} {:>9.3} {:>9.3}",
            s.feature, s.count, s.mean, s.std, s.min, s.max
        );
    }
}

fn print_correlations(matrix: &[[Option<f64>; 4]; 4]) {
    print!("{:<14}", "");
    for name in stats::FEATURE_NAMES {
        print!(" {:>13}", name);
    }
    println!();
    for (name, row) in stats::FEATURE_NAMES.iter().zip(matrix) {
        print!("{:<14}", name);
        for r in row {
            match r {
                Some(r) => print!(" {:>13.3}", r),
                None => print!(" {:>13}", "-"),
            }
        }
        println!();
    }
}

fn print_clusters(records: &[TrackFeatureRecord], clustering: &stats::Clustering) {
    let sizes = clustering.cluster_sizes();
    for (c, centroid) in clustering.centroids.iter().enumerate() {
        println!(
            "Cluster {} ({} tracks): tempo {:.1}  energy {:.3}  danceability {:.3}  valence {:.3}",
            c + 1,
            sizes[c],
            centroid[0],
            centroid[1],
            centroid[2],
            centroid[3]
        );
        let members: Vec<TrackFeatureRecord> = records
            .iter()
            .zip(&clustering.assignments)
            .filter(|(_, a)| **a == c)
            .map(|(r, _)| r.clone())
            .collect();
        print_track_table(&members);
        println!();
    }
    println!("Converged after {} iterations", clustering.iterations);
}
