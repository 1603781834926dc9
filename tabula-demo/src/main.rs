use std::path::Path;
use tabula::{Database, DatabaseConfig, Filter, Record, Registry};

mod records {
    include!(concat!(env!("OUT_DIR"), "/records.rs"));
}

use records::{Author, Book};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn load_config() -> tabula::Result<DatabaseConfig> {
    match std::env::var("TABULA_CONFIG") {
        Ok(path) => DatabaseConfig::from_file(Path::new(&path)),
        Err(_) => {
            let path = std::env::var("TABULA_DB").unwrap_or_else(|_| "library.db".to_string());
            Ok(DatabaseConfig::new(path))
        }
    }
}

fn run() -> tabula::Result<()> {
    let config = load_config()?;
    let registry = records::registry()?;

    let mut db = Database::open_with(&config)?;
    for schema in registry.iter() {
        db.create(schema)?;
    }
    log::info!("Tables: {:?}", db.tables()?);

    let book = shelve(&db, &registry, "Ursula", "The Dispossessed")?;
    log::info!("Saved book #{:?}", book.id);

    for book in list_books(&db, &registry)? {
        let json = serde_json::to_string(&book).unwrap_or_default();
        println!("{json}");
    }

    db.close()
}

/// Save an author and one of their books, returning the stored book.
fn shelve(db: &Database, registry: &Registry, author: &str, title: &str) -> tabula::Result<Book> {
    let author_schema = registry.entity(Author::ENTITY)?;
    let book_schema = registry.entity(Book::ENTITY)?;

    let author = Author {
        name: Some(author.to_string()),
        ..Default::default()
    };
    let mut entity = author.to_entity(&author_schema)?;
    db.save(&mut entity)?;

    let book = Book {
        title: Some(title.to_string()),
        published: Some(true),
        author: Some(Author::from_entity(&entity)?),
        ..Default::default()
    };
    let mut entity = book.to_entity(&book_schema)?;
    db.save(&mut entity)?;

    Book::from_entity(&db.get(&book_schema, &Filter::by_id(entity.id().unwrap_or_default()))?)
}

fn list_books(db: &Database, registry: &Registry) -> tabula::Result<Vec<Book>> {
    let book_schema = registry.entity(Book::ENTITY)?;
    db.all(&book_schema)?.iter().map(Book::from_entity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula::TabulaError;

    fn setup() -> (Database, Registry) {
        let registry = records::registry().unwrap();
        let db = Database::open_in_memory().unwrap();
        for schema in registry.iter() {
            db.create(schema).unwrap();
        }
        (db, registry)
    }

    #[test]
    fn test_generated_records_round_trip() {
        let (db, registry) = setup();
        let book = shelve(&db, &registry, "A", "T").unwrap();

        assert_eq!(book.id, Some(1));
        assert_eq!(book.title.as_deref(), Some("T"));
        assert_eq!(book.published, Some(true));
        assert_eq!(book.rating, None);
        let author = book.author.unwrap();
        assert_eq!(author.id, Some(1));
        assert_eq!(author.name.as_deref(), Some("A"));
    }

    #[test]
    fn test_list_books_hydrates_authors() {
        let (db, registry) = setup();
        shelve(&db, &registry, "A", "First").unwrap();
        shelve(&db, &registry, "B", "Second").unwrap();

        let books = list_books(&db, &registry).unwrap();
        let summary: Vec<(Option<String>, Option<String>)> = books
            .into_iter()
            .map(|b| (b.title, b.author.and_then(|a| a.name)))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some("First".to_string()), Some("A".to_string())),
                (Some("Second".to_string()), Some("B".to_string())),
            ]
        );
    }

    #[test]
    fn test_record_rejects_foreign_entity() {
        let (db, registry) = setup();
        shelve(&db, &registry, "A", "T").unwrap();

        let author_schema = registry.entity(Author::ENTITY).unwrap();
        let author = db.get(&author_schema, &Filter::by_id(1)).unwrap();
        assert!(matches!(Book::from_entity(&author), Err(TabulaError::Schema(_))));
        assert!(matches!(Book::default().to_entity(&author_schema), Err(TabulaError::Schema(_))));
    }

    #[test]
    fn test_unsaved_author_is_rejected_on_save() {
        let (db, registry) = setup();
        let book_schema = registry.entity(Book::ENTITY).unwrap();

        let book = Book {
            title: Some("Orphan".to_string()),
            author: Some(Author {
                name: Some("Nobody".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut entity = book.to_entity(&book_schema).unwrap();
        assert!(matches!(db.save(&mut entity), Err(TabulaError::Validation(_))));
        assert!(list_books(&db, &registry).unwrap().is_empty());
    }
}
