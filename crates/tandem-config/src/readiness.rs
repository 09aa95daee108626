use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the launcher decides that the API may be used by the bot.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReadinessMode {
    /// Sleep for the startup delay and assume the API is ready.
    #[default]
    Delay,
    /// Poll until a TCP connection to the API port succeeds.
    Tcp,
    /// Poll the API health route until it answers with a success status.
    Http,
}

impl ReadinessMode {
    /// Returns true when readiness is confirmed by an explicit probe.
    #[must_use]
    pub const fn probes(self) -> bool {
        matches!(self, Self::Tcp | Self::Http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("delay", ReadinessMode::Delay, false)]
    #[case("TCP", ReadinessMode::Tcp, true)]
    #[case("http", ReadinessMode::Http, true)]
    fn parses_modes(#[case] input: &str, #[case] expected: ReadinessMode, #[case] probes: bool) {
        let mode = input.parse::<ReadinessMode>().expect("mode parses");
        assert_eq!(mode, expected);
        assert_eq!(mode.probes(), probes);
    }
}
