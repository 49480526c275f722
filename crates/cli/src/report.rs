use screw_encoder::nesting;
use screw_encoder::screw_features::CapabilityRegistry;
use serde::Serialize;
use std::time::Duration;

/// Size and shape of one encoding, printed by `--stats`
#[derive(Debug, Clone, Serialize)]
pub struct EncodingStats {
    pub input_chars: usize,
    pub output_chars: usize,
    pub expansion: f64,
    pub max_depth: usize,
    pub max_chain: usize,
    pub elapsed_ms: u128,
}

impl EncodingStats {
    pub fn measure(input: &str, output: &str, elapsed: Duration) -> Self {
        let input_chars = input.chars().count();
        let output_chars = output.len();
        let shape = nesting::measure(output);
        Self {
            input_chars,
            output_chars,
            expansion: if input_chars == 0 {
                0.0
            } else {
                output_chars as f64 / input_chars as f64
            },
            max_depth: shape.max_depth,
            max_chain: shape.max_chain,
            elapsed_ms: elapsed.as_millis(),
        }
    }
}

pub fn render_feature_table(registry: &CapabilityRegistry) -> String {
    let width = registry
        .iter()
        .map(|info| info.name.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for info in registry.iter() {
        let kind = if info.elementary { ' ' } else { '*' };
        let available = if info.available { '+' } else { ' ' };
        out.push_str(&format!(
            "{available}{kind} {:<width$}  {}\n",
            info.name, info.description
        ));
        if !info.elementary && !info.includes.is_empty() {
            out.push_str(&format!(
                "   {:<width$}  = {}\n",
                "",
                info.includes.join(", ")
            ));
        }
    }
    out.push_str("\n* composite   + available in this engine\n");
    out
}
