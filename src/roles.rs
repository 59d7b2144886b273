//! Role catalogue for the night phase.
//!
//! The backend deals roles as French display names (`"Loup-Garou"`,
//! `"Garde"`, …). [`Role`] is the closed set the client knows about, and
//! [`Role::descriptor`] is the lookup table that drives the night panel: which
//! action a role performs, how many targets it needs, and what the role card
//! says. Adding a role means adding a variant and a table entry, nothing else.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::NightActionKind;

/// Roles dealt by the backend.
///
/// Serialized with the backend's French names. Anything the client does not
/// recognise resolves to [`Role::Villager`] through [`Role::from_wire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Loup-Garou")]
    Werewolf,
    #[serde(rename = "Voyante")]
    Seer,
    #[serde(rename = "Sorcière")]
    Witch,
    #[serde(rename = "Chasseur")]
    Hunter,
    #[serde(rename = "Cupidon")]
    Cupid,
    #[serde(rename = "Garde")]
    Guard,
    #[serde(rename = "Villageois")]
    Villager,
}

/// A secondary, target-less action offered next to the main one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialAction {
    pub kind: NightActionKind,
    pub label: &'static str,
}

/// Static description of what a role does at night.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDescriptor {
    /// Night action submitted on confirm, if the role has one.
    pub night_action: Option<NightActionKind>,
    /// Whether confirming requires choosing targets.
    pub requires_target: bool,
    /// Number of targets to choose when `requires_target` is set.
    pub target_count: usize,
    /// Secondary action (the witch's life potion).
    pub special_action: Option<SpecialAction>,
    /// Panel heading.
    pub title: &'static str,
    /// Night panel instructions.
    pub instructions: &'static str,
    /// Role card text.
    pub flavor_text: &'static str,
    /// Label of the confirm button.
    pub confirm_label: &'static str,
}

const WEREWOLF: RoleDescriptor = RoleDescriptor {
    night_action: Some(NightActionKind::Eliminate),
    requires_target: true,
    target_count: 1,
    special_action: None,
    title: "Choisissez votre victime",
    instructions: "Votez pour éliminer un villageois. Les autres loups votent aussi.",
    flavor_text: "Vous devez éliminer les villageois. Votez avec les autres loups pour tuer quelqu'un chaque nuit.",
    confirm_label: "Confirmer",
};

const SEER: RoleDescriptor = RoleDescriptor {
    night_action: Some(NightActionKind::Investigate),
    requires_target: true,
    target_count: 1,
    special_action: None,
    title: "Découvrez un rôle",
    instructions: "Sélectionnez un joueur pour découvrir son rôle.",
    flavor_text: "Chaque nuit, vous pouvez découvrir le rôle d'un joueur.",
    confirm_label: "Confirmer",
};

const WITCH: RoleDescriptor = RoleDescriptor {
    night_action: Some(NightActionKind::Poison),
    requires_target: true,
    target_count: 1,
    special_action: Some(SpecialAction {
        kind: NightActionKind::Save,
        label: "Sauver la victime",
    }),
    title: "Utilisez vos potions",
    instructions: "Potion de vie : sauvez la victime des loups. Potion de mort : tuez un joueur.",
    flavor_text: "Vous avez 2 potions : une pour sauver la victime des loups, une pour tuer quelqu'un.",
    confirm_label: "Tuer",
};

const HUNTER: RoleDescriptor = RoleDescriptor {
    night_action: None,
    requires_target: false,
    target_count: 0,
    special_action: None,
    title: "Vous dormez",
    instructions: "Attendez le jour pour voter !",
    flavor_text: "Si vous mourez, vous pouvez éliminer un joueur avec vous.",
    confirm_label: "Confirmer",
};

const CUPID: RoleDescriptor = RoleDescriptor {
    night_action: Some(NightActionKind::Pair),
    requires_target: true,
    target_count: 2,
    special_action: None,
    title: "Désignez les amoureux",
    instructions: "Sélectionnez deux joueurs qui seront liés pour toute la partie.",
    flavor_text: "La première nuit, vous désignez deux amoureux. Si l'un meurt, l'autre aussi.",
    confirm_label: "Confirmer",
};

const GUARD: RoleDescriptor = RoleDescriptor {
    night_action: Some(NightActionKind::Protect),
    requires_target: true,
    target_count: 1,
    special_action: None,
    title: "Protégez quelqu'un",
    instructions: "Choisissez un joueur à protéger contre les loups cette nuit.",
    flavor_text: "Chaque nuit, vous protégez un joueur contre les loups (pas le même deux fois de suite).",
    confirm_label: "Confirmer",
};

const VILLAGER: RoleDescriptor = RoleDescriptor {
    night_action: None,
    requires_target: false,
    target_count: 0,
    special_action: None,
    title: "Vous dormez paisiblement cette nuit...",
    instructions: "Attendez le jour pour voter !",
    flavor_text: "Vous êtes un simple villageois. Utilisez votre vote le jour pour éliminer les loups !",
    confirm_label: "Confirmer",
};

impl Role {
    /// All roles, in the order the backend deals special roles.
    pub const ALL: [Role; 7] = [
        Role::Werewolf,
        Role::Seer,
        Role::Witch,
        Role::Hunter,
        Role::Cupid,
        Role::Guard,
        Role::Villager,
    ];

    /// Resolve a role name from a snapshot.
    ///
    /// Unknown and missing roles resolve to [`Role::Villager`], which has no
    /// night action.
    pub fn from_wire(name: Option<&str>) -> Self {
        match name {
            Some("Loup-Garou") => Self::Werewolf,
            Some("Voyante") => Self::Seer,
            Some("Sorcière") => Self::Witch,
            Some("Chasseur") => Self::Hunter,
            Some("Cupidon") => Self::Cupid,
            Some("Garde") => Self::Guard,
            _ => Self::Villager,
        }
    }

    /// The backend's name for this role.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Werewolf => "Loup-Garou",
            Self::Seer => "Voyante",
            Self::Witch => "Sorcière",
            Self::Hunter => "Chasseur",
            Self::Cupid => "Cupidon",
            Self::Guard => "Garde",
            Self::Villager => "Villageois",
        }
    }

    /// Look up the static descriptor for this role.
    pub fn descriptor(&self) -> &'static RoleDescriptor {
        match self {
            Self::Werewolf => &WEREWOLF,
            Self::Seer => &SEER,
            Self::Witch => &WITCH,
            Self::Hunter => &HUNTER,
            Self::Cupid => &CUPID,
            Self::Guard => &GUARD,
            Self::Villager => &VILLAGER,
        }
    }

    /// `true` if the role does something at night.
    pub fn acts_at_night(&self) -> bool {
        self.descriptor().night_action.is_some()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_resolve_back() {
        for role in Role::ALL {
            assert_eq!(Role::from_wire(Some(role.wire_name())), role);
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.wire_name()));
        }
    }

    #[test]
    fn unknown_or_missing_role_is_villager() {
        assert_eq!(Role::from_wire(None), Role::Villager);
        assert_eq!(Role::from_wire(Some("Petite Fille")), Role::Villager);
        assert!(!Role::Villager.acts_at_night());
    }

    #[test]
    fn guard_protects_one_player() {
        let d = Role::Guard.descriptor();
        assert_eq!(d.night_action, Some(NightActionKind::Protect));
        assert!(d.requires_target);
        assert_eq!(d.target_count, 1);
        assert!(d.special_action.is_none());
    }

    #[test]
    fn witch_has_target_less_special_action() {
        let special = Role::Witch.descriptor().special_action.unwrap();
        assert_eq!(special.kind, NightActionKind::Save);
    }

    #[test]
    fn cupid_needs_two_targets() {
        assert_eq!(Role::Cupid.descriptor().target_count, 2);
    }

    #[test]
    fn targeted_roles_declare_a_count() {
        for role in Role::ALL {
            let d = role.descriptor();
            assert_eq!(d.requires_target, d.target_count > 0, "{role}");
            assert_eq!(d.requires_target, d.night_action.is_some(), "{role}");
        }
    }
}
