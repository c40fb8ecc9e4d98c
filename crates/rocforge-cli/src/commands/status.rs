use crate::support::{exit_with, resolve_site_or_exit};
use rocforge_patch::MappingPatch;
use rocforge_pip::PipClient;
use serde_json::json;

pub fn run(package: String, pip: String, json_output: bool) {
    let pip = PipClient::new(pip);
    let site = resolve_site_or_exit(&pip, &package);
    let report = MappingPatch::default()
        .state(&site)
        .unwrap_or_else(|err| exit_with(&err));

    if json_output {
        let payload = json!({
            "action": "status",
            "package": package,
            "mappingFile": report.mapping_file.display().to_string(),
            "state": report.state,
            "contentDigest": report.content_digest,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).expect("json serialization")
        );
    } else {
        println!("rocforge status --package {package}");
        println!("  Mapping file: {}", report.mapping_file.display());
        println!("  State: {}", report.state.as_str());
        println!("  Content digest: {}", report.content_digest);
    }
}
