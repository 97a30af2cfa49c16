use rusqlite::{params, OptionalExtension};

use vab_core::{domain::ChatId, menu::MenuState};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Last menu shown to `chat`. Unrecognized stored values read as `None`.
    pub fn menu(&self, chat: ChatId) -> Result<Option<MenuState>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT menu FROM context WHERE chat_id = ?1",
                params![chat.0],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|s| {
            let state = MenuState::parse(&s);
            if state.is_none() {
                tracing::warn!(chat_id = chat.0, menu = %s, "unknown stored menu state");
            }
            state
        }))
    }

    pub fn set_menu(&self, chat: ChatId, menu: MenuState) -> Result<()> {
        self.conn().execute(
            "INSERT INTO context (chat_id, menu) VALUES (?1, ?2)
             ON CONFLICT (chat_id) DO UPDATE SET menu = excluded.menu",
            params![chat.0, menu.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vab_core::domain::Category;

    #[test]
    fn menu_state_is_replaced() {
        let db = Database::open_in_memory().unwrap();
        let chat = ChatId(11);
        assert_eq!(db.menu(chat).unwrap(), None);

        db.set_menu(chat, MenuState::Settings).unwrap();
        db.set_menu(chat, MenuState::Calendar(Category::ExtraAlerts)).unwrap();
        assert_eq!(
            db.menu(chat).unwrap(),
            Some(MenuState::Calendar(Category::ExtraAlerts))
        );
        assert_eq!(db.menu(ChatId(12)).unwrap(), None);
    }

    #[test]
    fn garbage_menu_value_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute("INSERT INTO context (chat_id, menu) VALUES (1, 'nowhere')", [])
            .unwrap();
        assert_eq!(db.menu(ChatId(1)).unwrap(), None);
    }
}
