use anyhow::{Result, bail};
use tracing_subscriber::EnvFilter;

use opponent_radar::config::{load_config, save_config};
use opponent_radar::identity::normalize;
use opponent_radar::pipeline::{AnalysisOutcome, Analyzer};
use opponent_radar::pools::Pool;
use opponent_radar::resolver::{CandidateSet, SessionContext};

const USAGE: &str = "usage: opponent_radar <username> [options]
       opponent_radar --candidates <a,b,c> [options]

options:
  --self <username>   your own handle, excluded from resolution
  --sticky <username> last known opponent, used as a tie-break
  --pool <name>       preferred pool hint: bullet|blitz|rapid|daily
  --force             bypass the result cache
  --save-config       write the active thresholds to the config file";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    let mut username: Option<String> = None;
    let mut candidates: Option<String> = None;
    let mut self_name: Option<String> = None;
    let mut sticky_name: Option<String> = None;
    let mut pool: Option<Pool> = None;
    let mut force = false;
    let mut write_config = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--candidates" => candidates = iter.next().cloned(),
            "--self" => self_name = iter.next().cloned(),
            "--sticky" => sticky_name = iter.next().cloned(),
            "--pool" => {
                let Some(name) = iter.next() else {
                    bail!("--pool needs a value");
                };
                pool = match name.as_str() {
                    "bullet" => Some(Pool::Bullet),
                    "blitz" => Some(Pool::Blitz),
                    "rapid" => Some(Pool::Rapid),
                    "daily" => Some(Pool::Daily),
                    other => bail!("unknown pool {other:?}"),
                };
            }
            "--force" => force = true,
            "--save-config" => write_config = true,
            other if !other.starts_with('-') && username.is_none() => {
                username = Some(other.to_string());
            }
            other => bail!("unexpected argument {other:?}\n{USAGE}"),
        }
    }

    let mut session = SessionContext::default();
    if let Some(name) = &self_name {
        session = SessionContext::with_self_override(name);
        if session.self_identity.is_none() {
            bail!("invalid --self handle {name:?}");
        }
    }
    if let Some(name) = &sticky_name {
        session.sticky_opponent = normalize(name);
    }

    let config = load_config();
    if write_config {
        // Materializes the active thresholds (defaults merged with any
        // existing file) so they can be edited in place.
        save_config(&config)?;
        println!("config written");
        if candidates.is_none() && username.is_none() {
            return Ok(());
        }
    }

    let analyzer = Analyzer::with_session(config, session);

    let outcome = if let Some(raw) = candidates {
        let set = CandidateSet::from_raw(raw.split(','));
        analyzer.analyze_candidates(&[set], None, pool, force).await
    } else if let Some(name) = username {
        let Some(identity) = normalize(&name) else {
            bail!("invalid username {name:?}");
        };
        analyzer.assess(&identity, pool, force).await
    } else {
        bail!("nothing to analyze\n{USAGE}");
    };

    match outcome {
        AnalysisOutcome::Assessed { identity, assessment } => {
            println!("@{identity}: {}/100", assessment.score);
            println!(
                "accuracy threshold used: {}%",
                assessment.accuracy_threshold_used
            );
            if assessment.reasons.is_empty() {
                println!("no strong red flags detected");
            } else {
                for reason in &assessment.reasons {
                    println!("  - {reason}");
                }
            }
        }
        AnalysisOutcome::Unresolved => println!("cannot determine opponent yet"),
        AnalysisOutcome::Superseded => println!("analysis superseded by a newer target"),
        AnalysisOutcome::Failed { identity, error } => {
            println!("could not analyze @{identity}: {error}");
        }
    }

    Ok(())
}
