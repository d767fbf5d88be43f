//! crates/logging/src/config.rs
//! Verbosity configuration combining info and debug levels.

use super::levels::{DebugFlag, DebugLevels, InfoFlag, InfoLevels};

/// Combined verbosity configuration for info and debug flags.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VerbosityConfig {
    /// Info flag levels.
    pub info: InfoLevels,
    /// Debug flag levels.
    pub debug: DebugLevels,
    /// The `-v` count the table was derived from.
    pub verbose: u8,
}

impl VerbosityConfig {
    /// Builds the flag table implied by `-v` repeated `level` times.
    #[must_use]
    pub fn from_verbose_level(level: u8) -> Self {
        let mut config = Self {
            verbose: level,
            ..Self::default()
        };
        config.info.set(InfoFlag::Nonreg, 1);
        if level >= 1 {
            for flag in [
                InfoFlag::Copy,
                InfoFlag::Del,
                InfoFlag::Flist,
                InfoFlag::Misc,
                InfoFlag::Name,
                InfoFlag::Stats,
                InfoFlag::Symsafe,
            ] {
                config.info.raise(flag, 1);
            }
        }
        if level >= 2 {
            for flag in [InfoFlag::Misc, InfoFlag::Name, InfoFlag::Remove, InfoFlag::Skip] {
                config.info.raise(flag, 2);
            }
            for flag in [
                DebugFlag::Connect,
                DebugFlag::Del,
                DebugFlag::Deltasum,
                DebugFlag::Flist,
            ] {
                config.debug.raise(flag, 1);
            }
        }
        if level >= 3 {
            for flag in [
                DebugFlag::Connect,
                DebugFlag::Del,
                DebugFlag::Deltasum,
                DebugFlag::Flist,
            ] {
                config.debug.raise(flag, 2);
            }
            for flag in [
                DebugFlag::Exit,
                DebugFlag::Fuzzy,
                DebugFlag::Genr,
                DebugFlag::Own,
                DebugFlag::Recv,
                DebugFlag::Send,
            ] {
                config.debug.raise(flag, 1);
            }
        }
        if level >= 4 {
            config.debug.raise(DebugFlag::Deltasum, 3);
            config.debug.raise(DebugFlag::Flist, 3);
            config.debug.raise(DebugFlag::Proto, 2);
            config.debug.raise(DebugFlag::Exit, 3);
        }
        if level >= 5 {
            config.debug.raise(DebugFlag::Deltasum, 4);
            config.debug.raise(DebugFlag::Flist, 4);
            config.debug.raise(DebugFlag::Hlink, 1);
            config.debug.raise(DebugFlag::Io, 1);
        }
        config
    }

    /// Applies an `--info` token such as `copy2` or `skip`.
    pub fn apply_info_flag(&mut self, token: &str) -> Result<(), String> {
        let (name, level) = parse_flag_token(token)?;
        let flag = InfoFlag::from_name(name).ok_or_else(|| format!("unknown info flag: {name}"))?;
        self.info.set(flag, level);
        Ok(())
    }

    /// Applies a `--debug` token such as `recv2` or `io`.
    pub fn apply_debug_flag(&mut self, token: &str) -> Result<(), String> {
        let (name, level) = parse_flag_token(token)?;
        let flag =
            DebugFlag::from_name(name).ok_or_else(|| format!("unknown debug flag: {name}"))?;
        self.debug.set(flag, level);
        Ok(())
    }
}

/// Splits `copy2` into (`copy`, 2); a bare name means level 1.
fn parse_flag_token(token: &str) -> Result<(&str, u8), String> {
    if token.is_empty() {
        return Err("empty flag token".to_owned());
    }
    match token.find(|c: char| c.is_ascii_digit()) {
        Some(0) => Err(format!("missing flag name in: {token}")),
        Some(pos) => {
            let level = token[pos..]
                .parse::<u8>()
                .map_err(|_| format!("invalid level in flag: {token}"))?;
            Ok((&token[..pos], level))
        }
        None => Ok((token, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_still_reports_nonregular_files() {
        let config = VerbosityConfig::from_verbose_level(0);
        assert_eq!(config.info.get(InfoFlag::Nonreg), 1);
        assert_eq!(config.info.get(InfoFlag::Name), 0);
    }

    #[test]
    fn single_v_enables_names_and_stats() {
        let config = VerbosityConfig::from_verbose_level(1);
        assert_eq!(config.info.get(InfoFlag::Name), 1);
        assert_eq!(config.info.get(InfoFlag::Stats), 1);
        assert_eq!(config.debug.get(DebugFlag::Deltasum), 0);
    }

    #[test]
    fn levels_accumulate() {
        let config = VerbosityConfig::from_verbose_level(4);
        assert_eq!(config.info.get(InfoFlag::Skip), 2);
        assert_eq!(config.debug.get(DebugFlag::Deltasum), 3);
        assert_eq!(config.debug.get(DebugFlag::Proto), 2);
        assert_eq!(config.verbose, 4);
    }

    #[test]
    fn parse_tokens() {
        assert_eq!(parse_flag_token("copy").unwrap(), ("copy", 1));
        assert_eq!(parse_flag_token("recv3").unwrap(), ("recv", 3));
        assert!(parse_flag_token("").is_err());
        assert!(parse_flag_token("7").is_err());
    }

    #[test]
    fn apply_tokens() {
        let mut config = VerbosityConfig::default();
        config.apply_info_flag("stats2").unwrap();
        config.apply_debug_flag("io").unwrap();
        assert_eq!(config.info.get(InfoFlag::Stats), 2);
        assert_eq!(config.debug.get(DebugFlag::Io), 1);
        assert!(config.apply_info_flag("nope").is_err());
    }
}
