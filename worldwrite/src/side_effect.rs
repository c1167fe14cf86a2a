use std::str::FromStr;

use anyhow::anyhow;

/// A kind of work the world does after a block changes, beyond storing the new state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, derive_more::Display)]
pub enum SideEffect {
    /// Settle shape-dependent blocks against their neighbours before writing.
    #[display("validation")]
    Validation,
    #[display("lighting")]
    Lighting,
    /// Notify and reshape neighbouring blocks.
    #[display("neighbors")]
    Neighbors,
    /// Send the change to clients, without waking simulation.
    #[display("network")]
    Network,
    /// Full block update, including pathfinding and client sync.
    #[display("entity_ai")]
    EntityAi,
    /// Let external listeners observe physics updates.
    #[display("events")]
    Events,
    /// Point-of-interest bookkeeping.
    #[display("poi_update")]
    PoiUpdate,
    /// Remove/place physics callbacks of the old and new block.
    #[display("update")]
    Update,
}

impl SideEffect {
    pub const COUNT: usize = 8;

    pub const ALL: [SideEffect; Self::COUNT] = [
        SideEffect::Validation,
        SideEffect::Lighting,
        SideEffect::Neighbors,
        SideEffect::Network,
        SideEffect::EntityAi,
        SideEffect::Events,
        SideEffect::PoiUpdate,
        SideEffect::Update,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl FromStr for SideEffect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SideEffect::ALL
            .into_iter()
            .find(|effect| effect.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow!("unknown side effect: {:?}", s))
    }
}

/// A caller's choice for one side effect.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, derive_more::Display)]
pub enum SideEffectState {
    #[display("on")]
    On,
    #[display("off")]
    Off,
    /// Use whatever the platform defaults to.
    #[default]
    #[display("unset")]
    Unset,
}

impl From<bool> for SideEffectState {
    fn from(value: bool) -> Self {
        if value {
            SideEffectState::On
        } else {
            SideEffectState::Off
        }
    }
}

impl FromStr for SideEffectState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" => Ok(SideEffectState::On),
            "off" | "false" => Ok(SideEffectState::Off),
            "unset" | "default" => Ok(SideEffectState::Unset),
            _ => Err(anyhow!("invalid side effect state: {:?}", s)),
        }
    }
}

/// What an `Unset` side effect resolves to on this platform.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SideEffectDefaults(SideEffectSet);

impl SideEffectDefaults {
    pub fn with(self, effect: SideEffect, enabled: bool) -> Self {
        Self(self.0.with(effect, enabled))
    }

    pub fn get(&self, effect: SideEffect) -> bool {
        self.0.should_apply(effect)
    }
}

impl Default for SideEffectDefaults {
    fn default() -> Self {
        Self(SideEffectSet::all())
    }
}

/// Unresolved per-operation configuration, one tri-state per side effect.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct SideEffectConfig {
    states: [SideEffectState; SideEffect::COUNT],
}

impl SideEffectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, effect: SideEffect, state: SideEffectState) -> Self {
        self.states[effect as usize] = state;
        self
    }

    pub fn state(&self, effect: SideEffect) -> SideEffectState {
        self.states[effect as usize]
    }

    /// Resolve every `Unset` entry against `defaults`, producing the set the write pipeline sees.
    pub fn resolve(&self, defaults: &SideEffectDefaults) -> SideEffectSet {
        SideEffect::ALL
            .into_iter()
            .fold(SideEffectSet::none(), |set, effect| {
                let enabled = match self.state(effect) {
                    SideEffectState::On => true,
                    SideEffectState::Off => false,
                    SideEffectState::Unset => defaults.get(effect),
                };
                set.with(effect, enabled)
            })
    }
}

/// Resolved side effects for a write; every flag is plainly on or off.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct SideEffectSet {
    applied: u8,
}

impl SideEffectSet {
    /// Nothing beyond the raw storage write.
    pub const fn none() -> Self {
        Self { applied: 0 }
    }

    /// Full simulation semantics, as for an interactive single-block edit.
    pub const fn all() -> Self {
        Self { applied: u8::MAX }
    }

    /// All effects resolved against the built-in platform defaults.
    pub fn defaults() -> Self {
        SideEffectConfig::default().resolve(&SideEffectDefaults::default())
    }

    #[inline]
    pub const fn should_apply(&self, effect: SideEffect) -> bool {
        self.applied & effect.bit() != 0
    }

    pub const fn with(self, effect: SideEffect, enabled: bool) -> Self {
        let applied = if enabled {
            self.applied | effect.bit()
        } else {
            self.applied & !effect.bit()
        };
        Self { applied }
    }

    pub fn iter(&self) -> impl Iterator<Item = SideEffect> {
        let set = *self;
        SideEffect::ALL
            .into_iter()
            .filter(move |effect| set.should_apply(*effect))
    }

    pub fn is_none(&self) -> bool {
        self.applied == 0
    }
}

impl std::fmt::Debug for SideEffectSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl std::fmt::Display for SideEffectSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_none() {
            return f.write_str("<none>");
        }
        for (i, effect) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{effect}")?;
        }
        Ok(())
    }
}
