// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device store backed by the session's state file.
//!
//! All access goes through one `tokio-rusqlite` connection, which serializes
//! every closure on its own background thread.

use std::path::Path;

use rusqlite::{params, OptionalExtension};
use textpilot_core::error::EngineError;
use textpilot_core::jid::Jid;
use textpilot_core::traits::engine::{Contact, GroupInfo, GroupParticipant};
use tracing::{debug, warn};

/// Convert a storage-layer error into [`EngineError::Storage`].
fn storage_err(e: impl std::fmt::Display) -> EngineError {
    EngineError::Storage(e.to_string())
}

fn parse_stored_jid(raw: &str) -> Option<Jid> {
    match Jid::parse(raw) {
        Ok(jid) => Some(jid),
        Err(err) => {
            warn!(jid = raw, error = %err, "ignoring malformed identifier in device store");
            None
        }
    }
}

type ContactRow = (String, Option<String>, Option<String>, Option<String>);

fn contact_from_row((jid, push_name, full_name, business_name): ContactRow) -> Option<Contact> {
    Some(Contact {
        jid: Some(parse_stored_jid(&jid)?),
        push_name,
        full_name,
        business_name,
    })
}

struct GroupRow {
    jid: String,
    name: String,
    topic: Option<String>,
    participants: Vec<(String, bool)>,
}

fn group_from_row(row: GroupRow) -> Option<GroupInfo> {
    Some(GroupInfo {
        jid: parse_stored_jid(&row.jid)?,
        name: row.name,
        topic: row.topic,
        participants: row
            .participants
            .into_iter()
            .filter_map(|(jid, is_admin)| {
                Some(GroupParticipant {
                    jid: parse_stored_jid(&jid)?,
                    is_admin,
                })
            })
            .collect(),
    })
}

fn load_participants(
    conn: &rusqlite::Connection,
    group_jid: &str,
) -> Result<Vec<(String, bool)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT jid, is_admin FROM group_participants WHERE group_jid = ?1 ORDER BY jid",
    )?;
    let rows = stmt.query_map(params![group_jid], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
    })?;
    rows.collect()
}

/// Handle to one session's SQLite device store. Cheap to clone.
#[derive(Clone)]
pub struct LoopbackStore {
    conn: tokio_rusqlite::Connection,
}

impl LoopbackStore {
    /// Opens (creating if missing) the store at `path` and applies migrations.
    pub async fn open(path: &Path) -> Result<Self, EngineError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(storage_err)?;
        let store = Self { conn };
        store.initialize().await?;
        debug!(path = %path.display(), "device store opened");
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub async fn open_in_memory() -> Result<Self, EngineError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(storage_err)?;
        let store = Self { conn };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), EngineError> {
        let migrated = self
            .conn
            .call(|conn| -> Result<Result<(), refinery::Error>, rusqlite::Error> {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                Ok(crate::migrations::run_migrations(conn))
            })
            .await
            .map_err(storage_err)?;
        migrated.map_err(storage_err)
    }

    /// The paired device identity, if pairing has happened.
    pub async fn device_jid(&self) -> Result<Option<Jid>, EngineError> {
        let raw = self
            .conn
            .call(|conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row("SELECT jid FROM device WHERE id = 1", [], |row| row.get(0))
                    .optional()
            })
            .await
            .map_err(storage_err)?;
        Ok(raw.as_deref().and_then(parse_stored_jid))
    }

    pub async fn save_device(&self, jid: &Jid) -> Result<(), EngineError> {
        let jid = jid.to_string();
        let paired_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO device (id, jid, paired_at) VALUES (1, ?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET jid = excluded.jid, paired_at = excluded.paired_at",
                    params![jid, paired_at],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Inserts a contact, or fills in names on an existing one.
    ///
    /// `None` names never overwrite stored values.
    pub async fn upsert_contact(&self, contact: &Contact) -> Result<(), EngineError> {
        let Some(jid) = contact.jid.as_ref() else {
            return Err(EngineError::Protocol("contact has no identifier".into()));
        };
        let jid = jid.to_non_device().to_string();
        let push_name = contact.push_name.clone();
        let full_name = contact.full_name.clone();
        let business_name = contact.business_name.clone();
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO contacts (jid, push_name, full_name, business_name, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(jid) DO UPDATE SET
                        push_name = COALESCE(excluded.push_name, contacts.push_name),
                        full_name = COALESCE(excluded.full_name, contacts.full_name),
                        business_name = COALESCE(excluded.business_name, contacts.business_name),
                        updated_at = excluded.updated_at",
                    params![jid, push_name, full_name, business_name, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>, EngineError> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<ContactRow>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT jid, push_name, full_name, business_name FROM contacts ORDER BY jid",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?;
                rows.collect()
            })
            .await
            .map_err(storage_err)?;
        Ok(rows.into_iter().filter_map(contact_from_row).collect())
    }

    pub async fn contact(&self, jid: &Jid) -> Result<Option<Contact>, EngineError> {
        let key = jid.to_non_device().to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<ContactRow>, rusqlite::Error> {
                conn.query_row(
                    "SELECT jid, push_name, full_name, business_name FROM contacts WHERE jid = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()
            })
            .await
            .map_err(storage_err)?;
        Ok(row.and_then(contact_from_row))
    }

    /// Replaces a group's metadata and participant list.
    pub async fn upsert_group(&self, group: &GroupInfo) -> Result<(), EngineError> {
        let jid = group.jid.to_string();
        let name = group.name.clone();
        let topic = group.topic.clone();
        let participants: Vec<(String, bool)> = group
            .participants
            .iter()
            .map(|p| (p.jid.to_string(), p.is_admin))
            .collect();

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO groups (jid, name, topic) VALUES (?1, ?2, ?3)
                     ON CONFLICT(jid) DO UPDATE SET name = excluded.name, topic = excluded.topic",
                    params![jid, name, topic],
                )?;
                tx.execute(
                    "DELETE FROM group_participants WHERE group_jid = ?1",
                    params![jid],
                )?;
                for (participant, is_admin) in &participants {
                    tx.execute(
                        "INSERT INTO group_participants (group_jid, jid, is_admin) VALUES (?1, ?2, ?3)",
                        params![jid, participant, is_admin],
                    )?;
                }
                tx.commit()
            })
            .await
            .map_err(storage_err)
    }

    pub async fn groups(&self) -> Result<Vec<GroupInfo>, EngineError> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<GroupRow>, rusqlite::Error> {
                let mut stmt = conn.prepare("SELECT jid, name, topic FROM groups ORDER BY jid")?;
                let heads = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut groups = Vec::with_capacity(heads.len());
                for (jid, name, topic) in heads {
                    let participants = load_participants(conn, &jid)?;
                    groups.push(GroupRow {
                        jid,
                        name,
                        topic,
                        participants,
                    });
                }
                Ok(groups)
            })
            .await
            .map_err(storage_err)?;
        Ok(rows.into_iter().filter_map(group_from_row).collect())
    }

    pub async fn group(&self, jid: &Jid) -> Result<Option<GroupInfo>, EngineError> {
        let key = jid.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<GroupRow>, rusqlite::Error> {
                let head = conn
                    .query_row(
                        "SELECT jid, name, topic FROM groups WHERE jid = ?1",
                        params![key],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, Option<String>>(2)?,
                            ))
                        },
                    )
                    .optional()?;
                let Some((jid, name, topic)) = head else {
                    return Ok(None);
                };
                let participants = load_participants(conn, &jid)?;
                Ok(Some(GroupRow {
                    jid,
                    name,
                    topic,
                    participants,
                }))
            })
            .await
            .map_err(storage_err)?;
        Ok(row.and_then(group_from_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jid(raw: &str) -> Jid {
        Jid::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn device_identity_round_trip() {
        let store = LoopbackStore::open_in_memory().await.unwrap();
        assert_eq!(store.device_jid().await.unwrap(), None);

        store.save_device(&jid("1555:1@s.whatsapp.net")).await.unwrap();
        assert_eq!(
            store.device_jid().await.unwrap(),
            Some(jid("1555:1@s.whatsapp.net"))
        );
    }

    #[tokio::test]
    async fn upsert_contact_keeps_existing_names() {
        let store = LoopbackStore::open_in_memory().await.unwrap();
        store
            .upsert_contact(&Contact {
                jid: Some(jid("42:3@s.whatsapp.net")),
                push_name: Some("Zed".into()),
                ..Contact::default()
            })
            .await
            .unwrap();
        store
            .upsert_contact(&Contact {
                jid: Some(jid("42@s.whatsapp.net")),
                full_name: Some("Zed Shaw".into()),
                ..Contact::default()
            })
            .await
            .unwrap();

        let contact = store.contact(&jid("42@s.whatsapp.net")).await.unwrap().unwrap();
        assert_eq!(contact.push_name.as_deref(), Some("Zed"));
        assert_eq!(contact.full_name.as_deref(), Some("Zed Shaw"));
        assert_eq!(store.contacts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn contact_without_identifier_is_rejected() {
        let store = LoopbackStore::open_in_memory().await.unwrap();
        assert!(store.upsert_contact(&Contact::default()).await.is_err());
    }

    #[tokio::test]
    async fn groups_with_participants() {
        let store = LoopbackStore::open_in_memory().await.unwrap();
        let group = GroupInfo {
            jid: jid("120363-9@g.us"),
            name: "Ops".into(),
            topic: Some("on-call".into()),
            participants: vec![
                GroupParticipant {
                    jid: jid("1@s.whatsapp.net"),
                    is_admin: true,
                },
                GroupParticipant {
                    jid: jid("2@s.whatsapp.net"),
                    is_admin: false,
                },
            ],
        };
        store.upsert_group(&group).await.unwrap();
        assert_eq!(store.group(&group.jid).await.unwrap(), Some(group.clone()));

        let renamed = GroupInfo {
            name: "Ops team".into(),
            participants: vec![],
            ..group.clone()
        };
        store.upsert_group(&renamed).await.unwrap();
        let groups = store.groups().await.unwrap();
        assert_eq!(groups, vec![renamed]);
        assert_eq!(store.group(&jid("404@g.us")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn reopening_a_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");

        let store = LoopbackStore::open(&path).await.unwrap();
        store.save_device(&jid("7:1@s.whatsapp.net")).await.unwrap();
        drop(store);

        let reopened = LoopbackStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.device_jid().await.unwrap(),
            Some(jid("7:1@s.whatsapp.net"))
        );
    }
}
