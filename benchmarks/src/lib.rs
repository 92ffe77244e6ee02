//! Synthetic Mule configuration used by the benchmarks

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PLAIN_NAMES: &[&str] = &["http.host", "http.port", "db.url", "queue.name", "retry.count"];
const SENSITIVE_NAMES: &[&str] = &["db.password", "api.key", "oauth.client.secret", "jwt.token"];

/// A config file of roughly `lines` elements, about a third of them
/// carrying property references. Deterministic for a given seed.
pub fn generate_config(lines: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<mule>\n");
    out.push_str("  <secure-properties:config name=\"Secure\" file=\"secure.yaml\" key=\"${secure::key}\">\n");
    out.push_str("    <secure-properties:encrypt algorithm=\"AES\"/>\n  </secure-properties:config>\n");

    for i in 0..lines {
        match rng.gen_range(0..6) {
            0 => {
                let name = PLAIN_NAMES[rng.gen_range(0..PLAIN_NAMES.len())];
                out.push_str(&format!("  <http:request name=\"r{}\" host=\"${{{}}}\"/>\n", i, name));
            }
            1 => {
                let name = SENSITIVE_NAMES[rng.gen_range(0..SENSITIVE_NAMES.len())];
                let marker = if rng.gen_bool(0.7) { "secure::" } else { "" };
                out.push_str(&format!("  <db:config name=\"d{}\" password=\"${{{}{}}}\"/>\n", i, marker, name));
            }
            2 => {
                let name = SENSITIVE_NAMES[rng.gen_range(0..SENSITIVE_NAMES.len())];
                out.push_str(&format!(
                    "  <set-variable variableName=\"v{}\" value=\"#[Mule::p('secure::{}')]\"/>\n",
                    i, name
                ));
            }
            3 => out.push_str(&format!("  <!-- ${{secure::commented.{}}} -->\n", i)),
            _ => out.push_str(&format!("  <logger level=\"INFO\" message=\"step {}\"/>\n", i)),
        }
    }
    out.push_str("</mule>\n");
    out
}
