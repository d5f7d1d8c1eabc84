//! Command line value parsing

use anyhow::{bail, Context, Result};
use regex::Regex;

/// Item names are typed the way the game shows them ("Electronic Circuit")
/// but stored without spaces.
pub fn normalize_item_name(name: &str) -> String {
    name.split_whitespace().collect()
}

/// Parse a rate into items per second.
///
/// Accepts `10`, `2.5/s`, `600/min`, `2/h` and plain fractions like `1/3`.
pub fn parse_rate(input: &str) -> Result<f64> {
    let re = Regex::new(
        r"^\s*(?P<num>\d+(?:\.\d+)?|\.\d+)\s*(?:/\s*(?:(?P<den>\d+(?:\.\d+)?)|(?P<unit>s|sec|m|min|h|hr)))?\s*$",
    )?;
    let caps = re
        .captures(input)
        .with_context(|| format!("Invalid rate '{input}', expected e.g. 10, 600/min or 1/3"))?;

    let num: f64 = caps["num"].parse()?;
    let rate = if let Some(den) = caps.name("den") {
        let den: f64 = den.as_str().parse()?;
        if den == 0.0 {
            bail!("Invalid rate '{input}': division by zero");
        }
        num / den
    } else {
        match caps.name("unit").map(|m| m.as_str()) {
            None | Some("s" | "sec") => num,
            Some("m" | "min") => num / 60.0,
            Some(_) => num / 3600.0,
        }
    };

    if rate <= 0.0 {
        bail!("Invalid rate '{input}': must be positive");
    }
    Ok(rate)
}

/// Split an `Item=Recipe` override.
pub fn parse_override(input: &str) -> Result<(String, String)> {
    let Some((item, recipe)) = input.split_once('=') else {
        bail!("Invalid override '{input}', expected Item=Recipe");
    };
    let (item, recipe) = (normalize_item_name(item), normalize_item_name(recipe));
    if item.is_empty() || recipe.is_empty() {
        bail!("Invalid override '{input}', expected Item=Recipe");
    }
    Ok((item, recipe))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_lose_their_spaces() {
        assert_eq!(normalize_item_name("Electronic Circuit"), "ElectronicCircuit");
        assert_eq!(normalize_item_name("  Iron  Gear Wheel "), "IronGearWheel");
        assert_eq!(normalize_item_name("IronPlate"), "IronPlate");
    }

    #[test]
    fn rates_in_every_unit() {
        assert_eq!(parse_rate("10").unwrap(), 10.0);
        assert_eq!(parse_rate("2.5/s").unwrap(), 2.5);
        assert_eq!(parse_rate("600/min").unwrap(), 10.0);
        assert_eq!(parse_rate("7200 / h").unwrap(), 2.0);
        assert!((parse_rate("1/3").unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(parse_rate(".5").unwrap(), 0.5);
    }

    #[test]
    fn bad_rates_are_rejected() {
        for input in ["", "fast", "0", "1/0", "-3", "3/day", "1e3"] {
            assert!(parse_rate(input).is_err(), "{input} should fail");
        }
    }

    #[test]
    fn overrides_split_on_equals() {
        assert_eq!(
            parse_override("Heavy Oil=CoalLiquefaction").unwrap(),
            ("HeavyOil".to_string(), "CoalLiquefaction".to_string())
        );
        assert!(parse_override("HeavyOil").is_err());
        assert!(parse_override("=CoalLiquefaction").is_err());
    }
}
