use anyhow::Result;
use clap::Args;
use runner_core::ManifestInfo;

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Print compact JSON
    #[arg(long)]
    pub compact: bool,
}

pub fn run(args: ManifestArgs) -> Result<()> {
    println!("{}", render(&ManifestInfo::render(), args.compact)?);
    Ok(())
}

fn render(manifest: &ManifestInfo, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(manifest)?
    } else {
        serde_json::to_string_pretty(manifest)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_manifest_is_single_line() {
        let out = render(&ManifestInfo::render(), true).unwrap();
        assert!(!out.contains('\n'));
        assert!(out.contains("\"workItemID\""));
    }

    #[test]
    fn test_pretty_manifest_parses_back() {
        let out = render(&ManifestInfo::render(), false).unwrap();
        let parsed: ManifestInfo = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, ManifestInfo::render());
    }
}
