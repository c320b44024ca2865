//! # Catalog File Integration Test
//!
//! Loads a realistic catalog file through the store, including broken rows
//! and overrides, the way a server does at startup.

use std::sync::Arc;

use warden_catalog::{Action, Category, CheckCatalog, CheckKind, RowError, TomlCheckStore};

const CATALOG: &str = r#"
[[check]]
id = 1
kind = 0xF3
address = 0x00CF0BC8
length = 4
result = "8B4C2404"
comment = "movement speed patch"

[[check]]
id = 2
kind = 0xB2
data = "0102030400112233445566778899aabbccddeeff00112233"
address = 0x00401000
length = 16
comment = "known injector stub"

[[check]]
id = 3
kind = 0x8B
str = "return GetCVar('hackEnabled') == '1'"
comment = "hack cvar"

[[check]]
id = 4
kind = 0xD9
str = "wpe.dll"
comment = "packet editor"

[[check]]
id = 5
kind = 0x57
comment = "timing rows are never loaded"

[[check]]
id = 10050
kind = 0x8B
str = "return true"
comment = "id too large for the report format"

[[override]]
id = 1
action = 2

[[override]]
id = 3
action = 0
"#;

#[test]
fn test_load_catalog_file() {
    let store = TomlCheckStore::from_toml_str(CATALOG).unwrap();
    let catalog = Arc::new(CheckCatalog::from_store(&store, Action::Kick).unwrap());

    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.ids_in(Category::Inject), &[2, 4]);
    assert_eq!(catalog.ids_in(Category::Lua), &[3]);
    assert_eq!(catalog.ids_in(Category::Modded), &[1]);

    // Overrides win over the default action
    assert_eq!(catalog.get(1).unwrap().action, Action::Ban);
    assert_eq!(catalog.get(3).unwrap().action, Action::Log);
    assert_eq!(catalog.get(2).unwrap().action, Action::Kick);

    let rejected: Vec<_> = catalog.rejected().iter().map(|r| (r.id, r.error.clone())).collect();
    assert_eq!(
        rejected,
        vec![
            (5, RowError::Uncategorized(CheckKind::Timing)),
            (10050, RowError::LuaIdOutOfRange(10050)),
        ]
    );
}

#[test]
fn test_loaded_definitions_are_ready_to_encode() {
    let store = TomlCheckStore::from_toml_str(CATALOG).unwrap();
    let catalog = CheckCatalog::from_store(&store, Action::Kick).unwrap();

    let page = catalog.get(2).unwrap();
    assert_eq!(page.kind, CheckKind::PageA);
    assert_eq!(page.data.len(), warden_catalog::CHECK_DATA_LEN);

    let lua = catalog.get(3).unwrap();
    let script = lua.lua_script().unwrap();
    assert!(script.len() <= warden_catalog::MAX_LUA_SCRIPT_LENGTH);
    assert!(script.ends_with("'0003','GUILD')end"));
}
