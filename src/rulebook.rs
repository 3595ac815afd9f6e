//! The command rulebook: verb → rule dispatch table.
//!
//! Each wire verb resolves to a [`Rule`]. Queries and mutating commands are
//! distinguished structurally: a query rule carries only its operation tag,
//! a mutating rule carries an operation tag plus the static argument
//! signature the validator enforces. Resolution is lazy; nothing runs until
//! the engine executes the resolved rule.

use crate::protocol::validate::ArgSpec;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOp {
    LaserMains,
    LaserPower,
    LaserMode,
    ModPolarity,
    Modulation,
    TriggerThreshold,
    StrictMode,
}

/// Pure-read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    LaserMains,
    LaserPower,
    LaserStatus,
    LaserFault,
    LaserMode,
    ModPolarity,
    Modulation,
    TriggerThreshold,
    PowerNow,
    PowerMax,
    PowerNominal,
    AmpsNow,
    TempInternal,
    TempDiode,
    TempDiodeMax,
    TempDiodeMin,
    InfoLaser,
    InfoServer,
    InterlockStatus,
    InterlockOverride,
    StrictMode,
}

/// One rulebook entry.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Query(QueryOp),
    Command {
        op: CommandOp,
        signature: &'static [ArgSpec],
    },
}

const ON_OFF: &[&str] = &["ON", "OFF"];
const OPERATION_MODES: &[&str] = &["GATED", "MASTER", "INDEP"];
const POLARITIES: &[&str] = &["PASS", "INVERT"];
const WAVEFORMS: &[&str] = &["NONE", "SINE", "SQUARE", "TRIANGLE", "SAWTOOTH", "FULL"];

const PERCENT: ArgSpec = ArgSpec::Range { min: 0.0, max: 100.0 };
const FREQUENCY_HZ: ArgSpec = ArgSpec::Range { min: 0.0, max: 10_000.0 };

const SIG_MAINS: &[ArgSpec] = &[ArgSpec::Choice(ON_OFF)];
const SIG_POWER: &[ArgSpec] = &[PERCENT];
const SIG_MODE: &[ArgSpec] = &[ArgSpec::Choice(OPERATION_MODES)];
const SIG_POLARITY: &[ArgSpec] = &[ArgSpec::Choice(POLARITIES)];
const SIG_MODULATION: &[ArgSpec] = &[ArgSpec::Choice(WAVEFORMS), FREQUENCY_HZ, PERCENT];
const SIG_THRESHOLD: &[ArgSpec] = &[PERCENT];
const SIG_STRICT: &[ArgSpec] = &[ArgSpec::Choice(ON_OFF)];

static RULES: Lazy<HashMap<&'static str, Rule>> = Lazy::new(|| {
    use CommandOp as C;
    use QueryOp as Q;

    let mut rules = HashMap::new();
    let mut command = |verb, op, signature| {
        rules.insert(verb, Rule::Command { op, signature });
    };
    command("LASER_MAINS", C::LaserMains, SIG_MAINS);
    command("LASER_POWER", C::LaserPower, SIG_POWER);
    command("LASER_MODE", C::LaserMode, SIG_MODE);
    command("LASER_MOD_POLARITY", C::ModPolarity, SIG_POLARITY);
    command("LASER_MODULATION", C::Modulation, SIG_MODULATION);
    command("LASER_TRIGGER_THRESHOLD", C::TriggerThreshold, SIG_THRESHOLD);
    command("STRICT_MODE", C::StrictMode, SIG_STRICT);

    let mut query = |verb, op| {
        rules.insert(verb, Rule::Query(op));
    };
    query("?LASER_MAINS", Q::LaserMains);
    query("?LASER_POWER", Q::LaserPower);
    query("?LASER_STATUS", Q::LaserStatus);
    query("?LASER_FAULT", Q::LaserFault);
    query("?LASER_MODE", Q::LaserMode);
    query("?LASER_MOD_POLARITY", Q::ModPolarity);
    query("?LASER_MODULATION", Q::Modulation);
    query("?LASER_TRIGGER_THRESHOLD", Q::TriggerThreshold);
    query("?POWER_NOW", Q::PowerNow);
    query("?POWER_MAX", Q::PowerMax);
    query("?POWER_NOM", Q::PowerNominal);
    query("?AMPS_NOW", Q::AmpsNow);
    query("?TEMP_INTERNAL_NOW", Q::TempInternal);
    query("?TEMP_DIODE_NOW", Q::TempDiode);
    query("?TEMP_DIODE_MAX", Q::TempDiodeMax);
    query("?TEMP_DIODE_MIN", Q::TempDiodeMin);
    query("?INFO_LASER", Q::InfoLaser);
    query("?INFO_SERVER", Q::InfoServer);
    query("?INTERLOCK_STATUS", Q::InterlockStatus);
    query("?INTERLOCK_OVERRIDE", Q::InterlockOverride);
    query("?STRICT_MODE", Q::StrictMode);

    rules
});

/// Resolve a verb to its rule. Verbs are case-sensitive.
pub fn resolve(verb: &str) -> Option<Rule> {
    RULES.get(verb).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutating_verbs_carry_signatures() {
        match resolve("LASER_MODULATION") {
            Some(Rule::Command { op, signature }) => {
                assert_eq!(op, CommandOp::Modulation);
                assert_eq!(signature.len(), 3);
            }
            other => panic!("unexpected rule: {other:?}"),
        }
    }

    #[test]
    fn query_verbs_are_structural_not_string_sniffed() {
        assert!(matches!(
            resolve("?LASER_POWER"),
            Some(Rule::Query(QueryOp::LaserPower))
        ));
        // The bare verb and its query form are distinct entries.
        assert!(matches!(resolve("LASER_POWER"), Some(Rule::Command { .. })));
    }

    #[test]
    fn unknown_and_lowercased_verbs_do_not_resolve() {
        assert!(resolve("LASER_DISCO").is_none());
        assert!(resolve("laser_power").is_none());
    }
}
