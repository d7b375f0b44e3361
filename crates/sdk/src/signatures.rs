//! Gamedata keys for signatures and offsets
//!
//! These names must match the keys in `gamedata.json`.

/// Human customization update (detoured)
pub const CHANGE_CUSTOMIZE: &str = "ChangeCustomize";

/// Character copy, used for cutscene and GPose actors (detoured)
pub const COPY_CHARACTER: &str = "CopyCharacter";

/// Character destructor (detoured)
pub const CHARACTER_DESTRUCTOR: &str = "CharacterDestructor";

/// `mov rax, [rip+disp32]` loading the CharacterUtility instance pointer
pub const CHARACTER_UTILITY: &str = "CharacterUtility";

/// Offset of the object index within a GameObject
pub const OFFSET_GAME_OBJECT_INDEX: &str = "GameObject.ObjectIndex";

/// Offset of the object kind byte within a GameObject
pub const OFFSET_GAME_OBJECT_KIND: &str = "GameObject.ObjectKind";

/// Offset of the name buffer within a GameObject
pub const OFFSET_GAME_OBJECT_NAME: &str = "GameObject.Name";

/// Offset of the draw object pointer within a GameObject
pub const OFFSET_GAME_OBJECT_DRAW_OBJECT: &str = "GameObject.DrawObject";

/// Offset of the racial scaling resource within CharacterUtility
pub const OFFSET_UTILITY_HUMAN_CMP: &str = "CharacterUtility.HumanCmp";

/// Offset of the primary decal texture resource within CharacterUtility
pub const OFFSET_UTILITY_DECAL_PRIMARY: &str = "CharacterUtility.DecalPrimary";

/// Offset of the secondary decal texture resource within CharacterUtility
pub const OFFSET_UTILITY_DECAL_SECONDARY: &str = "CharacterUtility.DecalSecondary";

/// Function signatures that are installed as hooks
pub const HOOK_SIGNATURES: &[&str] = &[CHANGE_CUSTOMIZE, COPY_CHARACTER, CHARACTER_DESTRUCTOR];

/// Signatures resolved to static data addresses
pub const STATIC_SIGNATURES: &[&str] = &[CHARACTER_UTILITY];
