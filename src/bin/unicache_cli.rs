//! unicache CLI: 缓存后端连通性检查与键值操作的命令行工具
//!
//! Usage:
//!   unicache-cli ping                       Connect and report the selected backend
//!   unicache-cli get <key>                  Print the JSON value stored at key
//!   unicache-cli set <key> <json> [ttl]     Store a JSON value (ttl in seconds, 0 = no expiry)
//!   unicache-cli del <key>                  Delete a key
//!   unicache-cli exists <key>               Report whether key exists
//!   unicache-cli incr <key> [amount]        Increment an integer counter
//!   unicache-cli clear <pattern>            Delete keys matching a glob pattern

use anyhow::{bail, Context};
use std::time::Duration;
use unicache::{CacheSettings, UnifiedCache};

#[tokio::main]
async fn main() {
    unicache::logging::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "version" | "--version" | "-V" => {
            println!("unicache-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        command => run(command, &args[2..]).await,
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"unicache-cli: 统一缓存命令行工具

USAGE:
    unicache-cli <COMMAND> [ARGS]

COMMANDS:
    ping                        Connect and report the selected backend
    get <key>                   Print the JSON value stored at key
    set <key> <json> [ttl]      Store a JSON value. ttl is in seconds, defaults to
                                CACHE_DEFAULT_TTL_SECS; 0 stores without expiry
    del <key>                   Delete a key
    exists <key>                Report whether key exists
    incr <key> [amount]         Increment an integer counter (default 1)
    clear <pattern>             Delete keys matching a glob pattern
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    CACHE_REST_URL, CACHE_REST_TOKEN    Select the REST backend
    REDIS_URL, REDIS_PASSWORD           Native backend connection
    REDIS_MAX_CONNECTIONS               Native pool size
    RUST_LOG, UNICACHE_LOG_FORMAT       Logging"#
    );
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .with_context(|| format!("missing <{name}> argument"))
}

/// Seconds from the command line, or the configured default when omitted.
/// Zero from either source means the key never expires.
fn parse_ttl(arg: Option<&str>, default: Duration) -> anyhow::Result<Option<Duration>> {
    let ttl = match arg {
        Some(s) => Duration::from_secs(
            s.trim()
                .parse::<u64>()
                .with_context(|| format!("invalid ttl: {s}"))?,
        ),
        None => default,
    };
    Ok((!ttl.is_zero()).then_some(ttl))
}

async fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    if !matches!(
        command,
        "ping" | "get" | "set" | "del" | "exists" | "incr" | "clear"
    ) {
        print_usage();
        bail!("unknown command: {command}");
    }

    let settings = CacheSettings::from_env();
    let cache = UnifiedCache::from_settings(&settings).context("invalid cache settings")?;
    cache
        .connect()
        .await
        .with_context(|| format!("cannot connect to {} backend", cache.backend_name()))?;

    match command {
        "ping" => {
            let ok = cache.ping().await;
            println!("{} {}", cache.backend_name(), if ok { "PONG" } else { "unreachable" });
        }
        "get" => {
            let key = arg(args, 0, "key")?;
            match cache.get(key).await {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("(nil)"),
            }
        }
        "set" => {
            let key = arg(args, 0, "key")?;
            let raw = arg(args, 1, "json")?;
            let value: serde_json::Value =
                serde_json::from_str(raw).with_context(|| format!("not valid JSON: {raw}"))?;
            let ttl = parse_ttl(args.get(2).map(String::as_str), settings.default_ttl)?;
            println!("{}", if cache.set(key, &value, ttl).await { "OK" } else { "FAILED" });
        }
        "del" => {
            let key = arg(args, 0, "key")?;
            println!("{}", u8::from(cache.delete(key).await));
        }
        "exists" => {
            let key = arg(args, 0, "key")?;
            println!("{}", u8::from(cache.exists(key).await));
        }
        "incr" => {
            let key = arg(args, 0, "key")?;
            let amount = match args.get(1) {
                Some(s) => s
                    .parse::<i64>()
                    .with_context(|| format!("invalid amount: {s}"))?,
                None => 1,
            };
            match cache.increment(key, amount).await {
                Some(n) => println!("{n}"),
                None => bail!("increment failed"),
            }
        }
        "clear" => {
            let pattern = arg(args, 0, "pattern")?;
            println!("{}", cache.clear_pattern(pattern).await);
        }
        _ => unreachable!("command validated above"),
    }

    cache.disconnect().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_to_configured_value() {
        let default = Duration::from_secs(3600);
        assert_eq!(parse_ttl(None, default).unwrap(), Some(default));
        assert_eq!(parse_ttl(Some("60"), default).unwrap(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        let default = Duration::from_secs(3600);
        assert_eq!(parse_ttl(Some("0"), default).unwrap(), None);
        assert_eq!(parse_ttl(None, Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn rejects_non_numeric_ttl() {
        assert!(parse_ttl(Some("soon"), Duration::from_secs(1)).is_err());
        assert!(parse_ttl(Some("-5"), Duration::from_secs(1)).is_err());
    }
}
