use std::marker::PhantomData;

use super::{Table, Thing};

/// Id of a document in the table of `T`.
///
/// Serializes as the underlying [Thing]. Deserializing an id that points into another table fails.
pub struct Record<T> {
    thing: Thing,
    table: PhantomData<T>,
}

impl<T: Table> Record<T> {
    pub fn new(key: impl Into<surrealdb::sql::Id>) -> Self {
        Record::from_thing(Thing {
            tb: T::table().to_string(),
            id: key.into(),
        })
    }

    /// A fresh id keyed by a random UUID.
    pub fn uuid() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

impl<T> Record<T> {
    fn from_thing(thing: Thing) -> Self {
        Record {
            thing,
            table: PhantomData,
        }
    }

    /// The key without the table prefix, as handed out to clients.
    pub fn key(&self) -> String {
        self.thing.id.to_raw()
    }

    /// The `(table, key)` pair addressing the document.
    pub fn resource(&self) -> (String, String) {
        (self.thing.tb.clone(), self.key())
    }
}

impl<T> AsRef<Thing> for Record<T> {
    fn as_ref(&self) -> &Thing {
        &self.thing
    }
}

impl<T> std::fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.thing, f)
    }
}

impl<T> std::fmt::Display for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.thing, f)
    }
}

impl<T> Clone for Record<T> {
    fn clone(&self) -> Self {
        Record::from_thing(self.thing.clone())
    }
}

impl<T> PartialEq for Record<T> {
    fn eq(&self, other: &Self) -> bool {
        self.thing == other.thing
    }
}

impl<T> Eq for Record<T> {}

impl<T> serde::Serialize for Record<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.thing.serialize(serializer)
    }
}

impl<'de, T: Table> serde::Deserialize<'de> for Record<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let thing = Thing::deserialize(deserializer)?;

        if thing.tb != T::table() {
            return Err(serde::de::Error::custom(format!(
                "`{thing}` does not belong to the `{}` table",
                T::table()
            )));
        }

        Ok(Record::from_thing(thing))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Post, User};

    use super::*;

    #[test]
    fn key_and_resource_drop_the_table_prefix() {
        let record = Record::<Post>::new("0c6f2d4e-2b7a-4d55-9a43-3f0c9c1f2a10");

        assert_eq!(record.key(), "0c6f2d4e-2b7a-4d55-9a43-3f0c9c1f2a10");
        assert_eq!(
            record.resource(),
            ("posts".to_string(), "0c6f2d4e-2b7a-4d55-9a43-3f0c9c1f2a10".to_string())
        );
    }

    #[test]
    fn ids_from_another_table_are_rejected() {
        let user = serde_json::to_value(Record::<User>::new("reader")).unwrap();

        assert!(serde_json::from_value::<Record<Post>>(user.clone()).is_err());
        assert_eq!(
            serde_json::from_value::<Record<User>>(user).unwrap(),
            Record::<User>::new("reader")
        );
    }
}
