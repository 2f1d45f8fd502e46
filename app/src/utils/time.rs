/// Parses a Slack `ts` value for sort purposes. Handles composite reaction
/// ids (`"<ts>_<name>_<user>"`) by taking the prefix before the first `_`.
/// Malformed or missing values sort last.
pub fn parse_slack_ts(ts: Option<&str>) -> f64 {
    let Some(ts) = ts else {
        return f64::INFINITY;
    };
    let prefix = ts.split('_').next().unwrap_or(ts);
    prefix.parse::<f64>().unwrap_or(f64::INFINITY)
}

/// Slack `ts` to Mattermost `create_at` milliseconds.
pub fn ts_to_millis(ts: Option<&str>) -> Option<i64> {
    let ts = ts?;
    let prefix = ts.split('_').next().unwrap_or(ts);
    let val: f64 = prefix.parse().ok()?;
    Some((val * 1000.0).floor() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_ts() {
        assert_eq!(parse_slack_ts(Some("1704067200.000001")), 1704067200.000001);
    }

    #[test]
    fn parses_composite_reaction_id() {
        assert_eq!(parse_slack_ts(Some("200.0_thumbsup_U1")), 200.0);
    }

    #[test]
    fn malformed_sorts_last() {
        assert_eq!(parse_slack_ts(Some("not-a-number")), f64::INFINITY);
        assert_eq!(parse_slack_ts(None), f64::INFINITY);
    }

    #[test]
    fn millis_floor_matches_scenario_3() {
        assert_eq!(ts_to_millis(Some("200.0")), Some(200_000));
    }
}
