//! The whole recipe: patch the hipify table, then fetch and build the
//! sparse-kernel dependency and the MoE extension, fail-fast.

use crate::support::{exit_with, resolve_site_or_exit};
use chrono::Utc;
use rocforge_git::{GitClient, GitError};
use rocforge_patch::MappingPatch;
use rocforge_pip::{PipClient, PipError};
use serde_json::json;
use std::path::PathBuf;

pub struct Args {
    pub workdir: String,
    pub stk_url: String,
    pub stk_rev: Option<String>,
    pub moe_url: String,
    pub moe_rev: Option<String>,
    pub package: String,
    pub pip: String,
    pub git: String,
    pub json: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StepReport {
    step: &'static str,
    detail: String,
}

struct SourceBuild<'a> {
    name: &'static str,
    url: &'a str,
    rev: Option<&'a str>,
}

pub fn run(args: Args) {
    let started_at = Utc::now();
    let pip = PipClient::new(args.pip.as_str());
    let git = GitClient::new(args.git.as_str());
    let workdir = PathBuf::from(&args.workdir);

    if !pip.is_available() {
        eprintln!("error: {}", PipError::NotInstalled(args.pip.clone()));
        std::process::exit(1);
    }
    if !git.is_available() {
        eprintln!("error: {}", GitError::NotInstalled(args.git.clone()));
        std::process::exit(1);
    }

    if !args.json {
        println!("rocforge provision --workdir {}", workdir.display());
    }

    let mut steps: Vec<StepReport> = Vec::new();

    // Patch first so the extension builds against the extended table.
    let site = resolve_site_or_exit(&pip, &args.package);
    let patch = MappingPatch::default()
        .apply(&site)
        .unwrap_or_else(|err| exit_with(&err));
    record(
        &mut steps,
        args.json,
        "patch",
        format!(
            "{} ({})",
            patch.mapping_file.display(),
            patch.outcome.as_str()
        ),
    );

    let sources = [
        SourceBuild {
            name: "stk",
            url: &args.stk_url,
            rev: args.stk_rev.as_deref(),
        },
        SourceBuild {
            name: "megablocks",
            url: &args.moe_url,
            rev: args.moe_rev.as_deref(),
        },
    ];

    for source in sources {
        let dest = workdir.join(source.name);

        let cloned = git
            .clone_into(source.url, &dest, source.rev)
            .unwrap_or_else(|err| {
                eprintln!("error: {err}");
                std::process::exit(1);
            });
        record(
            &mut steps,
            args.json,
            "clone",
            format!("{} -> {} ({})", source.url, dest.display(), cloned.as_str()),
        );

        pip.install_from_source(&dest).unwrap_or_else(|err| {
            eprintln!("error: {err}");
            std::process::exit(1);
        });
        record(
            &mut steps,
            args.json,
            "build",
            format!("pip install --no-build-isolation {}", dest.display()),
        );
    }

    let finished_at = Utc::now();

    if args.json {
        let payload = json!({
            "action": "provision",
            "package": args.package,
            "workdir": workdir.display().to_string(),
            "mappingFile": patch.mapping_file.display().to_string(),
            "patchOutcome": patch.outcome,
            "contentDigest": patch.content_digest,
            "steps": steps,
            "startedAt": started_at.to_rfc3339(),
            "finishedAt": finished_at.to_rfc3339(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).expect("json serialization")
        );
    } else {
        println!("  Started: {}", started_at.to_rfc3339());
        println!("  Finished: {}", finished_at.to_rfc3339());
    }
}

fn record(steps: &mut Vec<StepReport>, json_output: bool, step: &'static str, detail: String) {
    if !json_output {
        println!("  {step}: {detail}");
    }
    steps.push(StepReport { step, detail });
}
