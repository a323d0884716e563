//! Known enumerated vocabularies of the GSI wire format.
//!
//! Each enum lists the values seen in the field today, with every accepted
//! spelling. These lists are expected to lag behind the game; fields typed
//! with them are always wrapped in [`ResolvedOrRaw`](crate::ResolvedOrRaw)
//! so that a newer value decodes to an unresolved raw string instead of an
//! error.

/// Generates an enum plus its [`WireEnum`](crate::WireEnum) lookup table.
///
/// Each variant lists its wire spellings; the first is canonical.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => [$($wire:literal),+ $(,)?]
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $crate::wire_enum::WireEnum for $name {
            const WIRE_TABLE: &'static [(&'static str, Self)] = &[
                $( $( ($wire, Self::$variant), )+ )+
            ];
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str($crate::wire_enum::WireEnum::wire_name(*self))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// map
// ---------------------------------------------------------------------------

wire_enum! {
    /// Game mode reported in `map.mode`.
    MapMode {
        /// Casual matchmaking.
        Casual => ["casual"],
        /// Competitive matchmaking.
        Competitive => ["competitive"],
        /// Two-versus-two competitive.
        Wingman => ["scrimcomp2v2", "wingman"],
        /// Deathmatch.
        Deathmatch => ["deathmatch"],
        /// Arms race.
        ArmsRace => ["gungameprogressive", "armsrace"],
        /// Demolition.
        Demolition => ["gungametrbomb", "demolition"],
        /// Battle royale.
        DangerZone => ["survival", "dangerzone"],
        /// Offline training course.
        Training => ["training"],
        /// Community or custom game mode.
        Custom => ["custom"],
        /// Guardian missions.
        Cooperative => ["cooperative"],
        /// Co-op strike missions.
        CoopMission => ["coopmission"],
    }
}

wire_enum! {
    /// Match phase reported in `map.phase`.
    MapPhase {
        /// Warmup before the match starts.
        Warmup => ["warmup"],
        /// Match in progress.
        Live => ["live"],
        /// Halftime or between maps.
        Intermission => ["intermission"],
        /// Match finished.
        GameOver => ["gameover"],
    }
}

wire_enum! {
    /// How a round was won, as listed in `map.round_wins`.
    RoundOutcome {
        /// Counter-terrorists eliminated the other team.
        CtWinElimination => ["ct_win_elimination"],
        /// Counter-terrorists defused the bomb.
        CtWinDefuse => ["ct_win_defuse"],
        /// Counter-terrorists ran the clock out.
        CtWinTime => ["ct_win_time"],
        /// Counter-terrorists rescued the hostages.
        CtWinRescue => ["ct_win_rescue"],
        /// Terrorists eliminated the other team.
        TWinElimination => ["t_win_elimination"],
        /// The bomb exploded.
        TWinBomb => ["t_win_bomb"],
        /// Terrorists ran the clock out.
        TWinTime => ["t_win_time"],
    }
}

// ---------------------------------------------------------------------------
// round
// ---------------------------------------------------------------------------

wire_enum! {
    /// Round phase reported in `round.phase`.
    RoundPhase {
        /// Buy time; players are frozen.
        FreezeTime => ["freezetime"],
        /// Round in progress.
        Live => ["live"],
        /// Round decided; waiting for the next one.
        Over => ["over"],
    }
}

wire_enum! {
    /// Bomb summary reported in `round.bomb`.
    RoundBomb {
        /// The bomb has been planted.
        Planted => ["planted"],
        /// The bomb exploded.
        Exploded => ["exploded"],
        /// The bomb was defused.
        Defused => ["defused"],
    }
}

wire_enum! {
    /// A side of the match.
    Team {
        /// Counter-terrorists.
        Ct => ["CT", "counterterrorist", "counter-terrorist"],
        /// Terrorists.
        T => ["T", "terrorist"],
    }
}

// ---------------------------------------------------------------------------
// player
// ---------------------------------------------------------------------------

wire_enum! {
    /// What the local player is doing, reported in `player.activity`.
    PlayerActivity {
        /// In game.
        Playing => ["playing"],
        /// In a menu.
        Menu => ["menu"],
        /// Typing in chat or console.
        TextInput => ["textinput"],
    }
}

wire_enum! {
    /// Weapon category reported in `weapons.weapon_N.type`.
    WeaponType {
        /// Knife.
        Knife => ["Knife"],
        /// Pistol.
        Pistol => ["Pistol"],
        /// Rifle.
        Rifle => ["Rifle"],
        /// Sniper rifle.
        SniperRifle => ["SniperRifle", "Sniper Rifle"],
        /// Submachine gun.
        SubmachineGun => ["Submachine Gun", "SubmachineGun"],
        /// Shotgun.
        Shotgun => ["Shotgun"],
        /// Machine gun.
        MachineGun => ["Machine Gun", "MachineGun"],
        /// Any throwable grenade.
        Grenade => ["Grenade"],
        /// The bomb.
        C4 => ["C4"],
        /// Stackable utility such as healthshots.
        StackableItem => ["StackableItem"],
        /// Danger zone tablet.
        Tablet => ["Tablet"],
        /// Bare fists.
        Fists => ["Fists"],
        /// Remote breach charge.
        BreachCharge => ["Breach Charge", "BreachCharge"],
        /// Melee weapon other than a knife.
        Melee => ["Melee"],
    }
}

wire_enum! {
    /// Weapon state reported in `weapons.weapon_N.state`.
    WeaponState {
        /// Currently held.
        Active => ["active"],
        /// Carried but not held.
        Holstered => ["holstered"],
        /// Being reloaded.
        Reloading => ["reloading"],
    }
}

// ---------------------------------------------------------------------------
// grenades, bomb, countdowns
// ---------------------------------------------------------------------------

wire_enum! {
    /// Grenade discriminator reported in `grenades.<id>.type`.
    GrenadeType {
        /// High explosive grenade in flight.
        Frag => ["frag", "hegrenade"],
        /// Flashbang in flight.
        Flashbang => ["flashbang"],
        /// Smoke grenade, in flight or deployed.
        Smoke => ["smoke", "smokegrenade"],
        /// Decoy grenade, in flight or deployed.
        Decoy => ["decoy"],
        /// Molotov or incendiary grenade in flight.
        Firebomb => ["firebomb", "molotov", "incgrenade"],
        /// Fire burning on the ground after a firebomb lands.
        Inferno => ["inferno"],
    }
}

wire_enum! {
    /// Bomb state reported in `bomb.state`.
    BombStatus {
        /// Held by a player.
        Carried => ["carried"],
        /// Lying on the ground.
        Dropped => ["dropped"],
        /// Planted and ticking.
        Planted => ["planted"],
        /// Being planted.
        Planting => ["planting"],
        /// Being defused.
        Defusing => ["defusing"],
        /// Defused.
        Defused => ["defused"],
        /// Exploded.
        Exploded => ["exploded"],
    }
}

wire_enum! {
    /// Phase reported in `phase_countdowns.phase`.
    CountdownPhase {
        /// Buy time.
        FreezeTime => ["freezetime"],
        /// Bomb planted.
        Bomb => ["bomb"],
        /// Warmup.
        Warmup => ["warmup"],
        /// Round in progress.
        Live => ["live"],
        /// Round over.
        Over => ["over"],
        /// Bomb being defused.
        Defuse => ["defuse"],
        /// Match paused.
        Paused => ["paused"],
        /// Tactical timeout called by counter-terrorists.
        TimeoutCt => ["timeout_ct"],
        /// Tactical timeout called by terrorists.
        TimeoutT => ["timeout_t"],
    }
}
