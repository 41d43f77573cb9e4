use crate::config::validate_key_format;
use crate::flow::{IdentifierNormalizer, KeyFormat};
use anyhow::{bail, Result};

/// Print `raw -> key` for every value; fails if any value is rejected
pub fn run_normalize(values: &[String], key_width: Option<usize>) -> Result<()> {
    let format = match key_width {
        Some(width) => KeyFormat::ZeroPadded { width },
        None => KeyFormat::Plain,
    };
    validate_key_format(format)?;
    let normalizer = IdentifierNormalizer::new(format);

    let mut rejected = 0usize;
    for raw in values {
        match normalizer.parse(raw) {
            Ok(id) => println!("{} -> {}", raw, normalizer.render(id)),
            Err(err) => {
                rejected += 1;
                eprintln!("✗ {}", err);
            }
        }
    }

    if rejected > 0 {
        bail!("{} of {} values could not be normalized", rejected, values.len());
    }
    Ok(())
}
