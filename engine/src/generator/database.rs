//! Optional database-schema artifacts
//!
//! When a recognized ORM is present, model/schema files are parsed with the
//! same regex-driven approach as the language parsers and two extra
//! artifacts are produced: `database-schema` (tables, columns,
//! relationships, keys, indexes) and `table-module-mapping` (which module
//! defines each table). Parsing never connects to a live database.

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::LazyLock;

use super::ProjectAnalysis;
use crate::types::Language;

/// A column in a parsed table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub primary_key: bool,
}

/// A relationship from one table to another
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDef {
    pub kind: String,
    pub target: String,
}

/// A parsed table/model definition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDef {
    pub name: String,
    pub file: String,
    pub columns: Vec<ColumnDef>,
    pub relationships: Vec<RelationDef>,
    pub indexes: Vec<String>,
}

/// Recognized ORMs, checked in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orm {
    Prisma,
    Sequelize,
    TypeOrm,
    Mongoose,
    DjangoOrm,
    SqlAlchemy,
    ActiveRecord,
    Knex,
}

impl Orm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prisma => "prisma",
            Self::Sequelize => "sequelize",
            Self::TypeOrm => "typeorm",
            Self::Mongoose => "mongoose",
            Self::DjangoOrm => "django-orm",
            Self::SqlAlchemy => "sqlalchemy",
            Self::ActiveRecord => "activerecord",
            Self::Knex => "knex",
        }
    }
}

/// Detect the project's ORM from scanned files and manifest dependencies
pub fn detect_orm(analysis: &ProjectAnalysis) -> Option<Orm> {
    let has_file = |pred: &dyn Fn(&str) -> bool| {
        analysis.files.iter().any(|f| pred(&f.relative_path))
    };
    let has_dep = |dep: &str| analysis.external_dependencies.iter().any(|d| d == dep);

    if has_file(&|p| p.ends_with(".prisma")) || has_dep("@prisma/client") || has_dep("prisma") {
        return Some(Orm::Prisma);
    }
    if has_dep("sequelize") {
        return Some(Orm::Sequelize);
    }
    if has_dep("typeorm") {
        return Some(Orm::TypeOrm);
    }
    if has_dep("mongoose") {
        return Some(Orm::Mongoose);
    }
    if has_dep("django") && has_file(&|p| p.ends_with("models.py") || p.contains("/models/")) {
        return Some(Orm::DjangoOrm);
    }
    if has_dep("sqlalchemy") {
        return Some(Orm::SqlAlchemy);
    }
    if has_file(&|p| p == "Gemfile") && has_file(&|p| p.starts_with("app/models/")) {
        return Some(Orm::ActiveRecord);
    }
    if has_dep("knex") {
        return Some(Orm::Knex);
    }
    None
}

/// Build the two database artifacts, or `None` when no ORM is recognized or
/// no tables parse out of the candidate files
pub fn build_database_artifacts(analysis: &ProjectAnalysis) -> Option<(Value, Value)> {
    let orm = detect_orm(analysis)?;

    let mut tables: Vec<TableDef> = Vec::new();
    for file in &analysis.files {
        if !is_model_candidate(orm, &file.relative_path, file.language) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&file.absolute_path) else {
            continue;
        };
        let parsed = match orm {
            Orm::Prisma => parse_prisma(&content, &file.relative_path),
            Orm::Sequelize => parse_sequelize(&content, &file.relative_path),
            Orm::TypeOrm => parse_typeorm(&content, &file.relative_path),
            Orm::Mongoose => parse_mongoose(&content, &file.relative_path),
            Orm::DjangoOrm => parse_django(&content, &file.relative_path),
            Orm::SqlAlchemy => parse_sqlalchemy(&content, &file.relative_path),
            Orm::ActiveRecord => parse_activerecord(&content, &file.relative_path),
            Orm::Knex => parse_knex(&content, &file.relative_path),
        };
        tables.extend(parsed);
    }

    if tables.is_empty() {
        return None;
    }
    tables.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.file.cmp(&b.file)));

    let schema = json!({
        "orm": orm.name(),
        "tables": tables,
    });
    let mappings: Vec<Value> = tables
        .iter()
        .map(|t| {
            let module = match t.file.split_once('/') {
                Some((dir, _)) => dir,
                None => ".",
            };
            json!({"table": t.name, "file": t.file, "module": module})
        })
        .collect();
    let mapping = json!({ "mappings": mappings });

    Some((schema, mapping))
}

/// Whether a file is worth parsing for the given ORM
fn is_model_candidate(orm: Orm, path: &str, language: Language) -> bool {
    let lower = path.to_lowercase();
    match orm {
        Orm::Prisma => lower.ends_with(".prisma"),
        Orm::Sequelize | Orm::TypeOrm | Orm::Mongoose | Orm::Knex => {
            matches!(language, Language::JavaScript | Language::TypeScript)
                && (lower.contains("model")
                    || lower.contains("entit")
                    || lower.contains("schema")
                    || lower.contains("migration")
                    || lower.contains("/db/"))
        }
        Orm::DjangoOrm | Orm::SqlAlchemy => {
            language == Language::Python
                && (lower.ends_with("models.py")
                    || lower.contains("/models/")
                    || lower.contains("model"))
        }
        Orm::ActiveRecord => lower.starts_with("app/models/") && lower.ends_with(".rb"),
    }
}

static RE_PRISMA_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^model\s+(?P<name>\w+)\s*\{(?P<body>.*?)^\}").unwrap());

fn parse_prisma(content: &str, file: &str) -> Vec<TableDef> {
    static RE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^\s*(?P<name>[a-zA-Z]\w*)\s+(?P<type>[A-Za-z]\w*(?:\[\])?\??)(?P<rest>[^\n]*)$").unwrap()
    });
    static RE_INDEX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"@@index\(\[(?P<cols>[^\]]*)\]").unwrap());

    RE_PRISMA_MODEL
        .captures_iter(content)
        .map(|model| {
            let body = &model["body"];
            let mut columns = Vec::new();
            let mut relationships = Vec::new();
            for field in RE_FIELD.captures_iter(body) {
                let rest = &field["rest"];
                let type_name = field["type"].trim_end_matches(['?', '[', ']']);
                if rest.contains("@relation")
                    || (type_name.chars().next().is_some_and(|c| c.is_uppercase())
                        && !is_prisma_scalar(type_name))
                {
                    relationships.push(RelationDef {
                        kind: "relation".to_owned(),
                        target: type_name.to_owned(),
                    });
                    continue;
                }
                columns.push(ColumnDef {
                    name: field["name"].to_owned(),
                    column_type: field["type"].to_owned(),
                    primary_key: rest.contains("@id"),
                });
            }
            let indexes = RE_INDEX
                .captures_iter(body)
                .map(|c| c["cols"].trim().to_owned())
                .collect();
            TableDef {
                name: model["name"].to_owned(),
                file: file.to_owned(),
                columns,
                relationships,
                indexes,
            }
        })
        .collect()
}

fn is_prisma_scalar(type_name: &str) -> bool {
    matches!(
        type_name,
        "String" | "Int" | "BigInt" | "Float" | "Decimal" | "Boolean" | "DateTime" | "Json"
            | "Bytes"
    )
}

fn parse_sequelize(content: &str, file: &str) -> Vec<TableDef> {
    static RE_DEFINE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?s)\.define\(\s*['"](?P<name>\w+)['"]\s*,\s*\{(?P<body>.*?)\}\s*[,)]"#)
            .unwrap()
    });
    static RE_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^\s*(?P<name>\w+)\s*:").unwrap()
    });

    RE_DEFINE
        .captures_iter(content)
        .map(|model| {
            let body = &model["body"];
            let columns = RE_COLUMN
                .captures_iter(body)
                .map(|c| ColumnDef {
                    name: c["name"].to_owned(),
                    column_type: "unknown".to_owned(),
                    primary_key: false,
                })
                .collect();
            TableDef {
                name: model["name"].to_owned(),
                file: file.to_owned(),
                columns,
                relationships: Vec::new(),
                indexes: Vec::new(),
            }
        })
        .collect()
}

fn parse_typeorm(content: &str, file: &str) -> Vec<TableDef> {
    static RE_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"@Entity\(\s*(?:['\x22](?P<table>\w+)['\x22]\s*)?\)[\s\S]*?class\s+(?P<class>\w+)")
            .unwrap()
    });
    static RE_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"@(?P<kind>PrimaryGeneratedColumn|PrimaryColumn|Column)\([^)]*\)\s*\n\s*(?P<name>\w+)\s*[!?]?\s*:\s*(?P<type>\w+)")
            .unwrap()
    });
    static RE_RELATION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"@(?P<kind>OneToMany|ManyToOne|OneToOne|ManyToMany)\(\s*\(\)\s*=>\s*(?P<target>\w+)")
            .unwrap()
    });

    RE_ENTITY
        .captures_iter(content)
        .map(|entity| {
            let name = entity
                .name("table")
                .map(|m| m.as_str().to_owned())
                .unwrap_or_else(|| entity["class"].to_owned());
            let columns = RE_COLUMN
                .captures_iter(content)
                .map(|c| ColumnDef {
                    name: c["name"].to_owned(),
                    column_type: c["type"].to_owned(),
                    primary_key: c["kind"].starts_with("Primary"),
                })
                .collect();
            let relationships = RE_RELATION
                .captures_iter(content)
                .map(|r| RelationDef {
                    kind: r["kind"].to_owned(),
                    target: r["target"].to_owned(),
                })
                .collect();
            TableDef {
                name,
                file: file.to_owned(),
                columns,
                relationships,
                indexes: Vec::new(),
            }
        })
        .collect()
}

fn parse_mongoose(content: &str, file: &str) -> Vec<TableDef> {
    static RE_MODEL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?:mongoose\.)?model\(\s*['"](?P<name>\w+)['"]"#).unwrap()
    });
    static RE_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)new\s+(?:mongoose\.)?Schema\(\s*\{(?P<body>.*?)\}\s*[,)]").unwrap()
    });
    static RE_FIELD: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^\s*(?P<name>\w+)\s*:").unwrap());

    let columns: Vec<ColumnDef> = RE_SCHEMA
        .captures(content)
        .map(|schema| {
            RE_FIELD
                .captures_iter(&schema["body"])
                .map(|f| ColumnDef {
                    name: f["name"].to_owned(),
                    column_type: "unknown".to_owned(),
                    primary_key: false,
                })
                .collect()
        })
        .unwrap_or_default();

    RE_MODEL
        .captures_iter(content)
        .map(|model| TableDef {
            name: model["name"].to_owned(),
            file: file.to_owned(),
            columns: columns.clone(),
            relationships: Vec::new(),
            indexes: Vec::new(),
        })
        .collect()
}

fn parse_django(content: &str, file: &str) -> Vec<TableDef> {
    static RE_MODEL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?ms)^class\s+(?P<name>\w+)\(.*?models\.Model.*?\):\n(?P<body>(?:[ \t]+[^\n]*\n|\n)*)")
            .unwrap()
    });
    static RE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]+(?P<name>\w+)\s*=\s*models\.(?P<type>\w+)\((?P<args>[^)]*)").unwrap()
    });

    RE_MODEL
        .captures_iter(content)
        .map(|model| {
            let body = &model["body"];
            let mut columns = Vec::new();
            let mut relationships = Vec::new();
            for field in RE_FIELD.captures_iter(body) {
                let field_type = &field["type"];
                if matches!(field_type, "ForeignKey" | "ManyToManyField" | "OneToOneField") {
                    let target = field["args"]
                        .split(',')
                        .next()
                        .unwrap_or("")
                        .trim()
                        .trim_matches(|c| c == '\'' || c == '"')
                        .to_owned();
                    relationships.push(RelationDef {
                        kind: field_type.to_owned(),
                        target,
                    });
                } else {
                    columns.push(ColumnDef {
                        name: field["name"].to_owned(),
                        column_type: field_type.to_owned(),
                        primary_key: field["args"].contains("primary_key=True"),
                    });
                }
            }
            TableDef {
                name: model["name"].to_owned(),
                file: file.to_owned(),
                columns,
                relationships,
                indexes: Vec::new(),
            }
        })
        .collect()
}

fn parse_sqlalchemy(content: &str, file: &str) -> Vec<TableDef> {
    static RE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?ms)^class\s+(?P<class>\w+)\([^)]*\):\n(?P<body>(?:[ \t]+[^\n]*\n|\n)*)"#)
            .unwrap()
    });
    static RE_TABLENAME: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"__tablename__\s*=\s*['"](?P<name>\w+)['"]"#).unwrap()
    });
    static RE_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]+(?P<name>\w+)\s*=\s*Column\((?P<args>[^)]*)").unwrap()
    });
    static RE_RELATION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"relationship\(\s*['"](?P<target>\w+)['"]"#).unwrap()
    });

    RE_CLASS
        .captures_iter(content)
        .filter_map(|class| {
            let body = &class["body"];
            let table = RE_TABLENAME.captures(body)?;
            let columns = RE_COLUMN
                .captures_iter(body)
                .map(|c| ColumnDef {
                    name: c["name"].to_owned(),
                    column_type: c["args"]
                        .split(',')
                        .next()
                        .unwrap_or("unknown")
                        .trim()
                        .to_owned(),
                    primary_key: c["args"].contains("primary_key=True"),
                })
                .collect();
            let relationships = RE_RELATION
                .captures_iter(body)
                .map(|r| RelationDef {
                    kind: "relationship".to_owned(),
                    target: r["target"].to_owned(),
                })
                .collect();
            Some(TableDef {
                name: table["name"].to_owned(),
                file: file.to_owned(),
                columns,
                relationships,
                indexes: Vec::new(),
            })
        })
        .collect()
}

fn parse_activerecord(content: &str, file: &str) -> Vec<TableDef> {
    static RE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^class\s+(?P<name>\w+)\s*<\s*(?:ApplicationRecord|ActiveRecord::Base)")
            .unwrap()
    });
    static RE_RELATION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^\s*(?P<kind>has_many|has_one|belongs_to)\s+:(?P<target>\w+)").unwrap()
    });

    RE_CLASS
        .captures_iter(content)
        .map(|class| {
            let relationships = RE_RELATION
                .captures_iter(content)
                .map(|r| RelationDef {
                    kind: r["kind"].to_owned(),
                    target: r["target"].to_owned(),
                })
                .collect();
            TableDef {
                name: class["name"].to_owned(),
                file: file.to_owned(),
                columns: Vec::new(),
                relationships,
                indexes: Vec::new(),
            }
        })
        .collect()
}

fn parse_knex(content: &str, file: &str) -> Vec<TableDef> {
    static RE_CREATE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?s)createTable\(\s*['"](?P<name>\w+)['"](?P<body>.*?)\}\s*\)"#).unwrap()
    });
    static RE_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"table\.(?P<type>\w+)\(\s*['"](?P<name>\w+)['"]"#).unwrap()
    });

    RE_CREATE
        .captures_iter(content)
        .map(|create| {
            let body = &create["body"];
            let columns = RE_COLUMN
                .captures_iter(body)
                .filter(|c| &c["type"] != "increments")
                .map(|c| ColumnDef {
                    name: c["name"].to_owned(),
                    column_type: c["type"].to_owned(),
                    primary_key: false,
                })
                .collect();
            TableDef {
                name: create["name"].to_owned(),
                file: file.to_owned(),
                columns,
                relationships: Vec::new(),
                indexes: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prisma() {
        let content = "model User {\n  id    Int     @id @default(autoincrement())\n  email String  @unique\n  posts Post[]\n\n  @@index([email])\n}\n\nmodel Post {\n  id     Int  @id\n  author User @relation(fields: [authorId], references: [id])\n  authorId Int\n}\n";
        let tables = parse_prisma(content, "prisma/schema.prisma");
        assert_eq!(tables.len(), 2);

        let user = &tables[0];
        assert_eq!(user.name, "User");
        assert!(user.columns.iter().any(|c| c.name == "id" && c.primary_key));
        assert!(user.relationships.iter().any(|r| r.target == "Post"));
        assert_eq!(user.indexes, vec!["email"]);
    }

    #[test]
    fn test_parse_django() {
        let content = "from django.db import models\n\nclass Article(models.Model):\n    title = models.CharField(max_length=200)\n    author = models.ForeignKey('User', on_delete=models.CASCADE)\n    slug = models.SlugField(primary_key=True)\n\nclass Plain:\n    pass\n";
        let tables = parse_django(content, "blog/models.py");
        assert_eq!(tables.len(), 1);

        let article = &tables[0];
        assert_eq!(article.name, "Article");
        assert!(article.columns.iter().any(|c| c.name == "slug" && c.primary_key));
        assert_eq!(article.relationships[0].target, "User");
        assert_eq!(article.relationships[0].kind, "ForeignKey");
    }

    #[test]
    fn test_parse_sqlalchemy() {
        let content = "class User(Base):\n    __tablename__ = 'users'\n    id = Column(Integer, primary_key=True)\n    name = Column(String)\n    posts = relationship('Post', back_populates='author')\n";
        let tables = parse_sqlalchemy(content, "app/models.py");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "users");
        assert!(tables[0].columns.iter().any(|c| c.name == "id" && c.primary_key));
        assert_eq!(tables[0].relationships[0].target, "Post");
    }

    #[test]
    fn test_parse_mongoose() {
        let content = "const userSchema = new Schema({\n  email: { type: String, required: true },\n  age: Number,\n});\n\nmodule.exports = mongoose.model('User', userSchema);\n";
        let tables = parse_mongoose(content, "models/user.js");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "User");
        assert!(tables[0].columns.iter().any(|c| c.name == "email"));
    }

    #[test]
    fn test_parse_knex() {
        let content = "exports.up = function (knex) {\n  return knex.schema.createTable('accounts', (table) => {\n    table.increments('id');\n    table.string('email');\n    table.integer('balance');\n  });\n};\n";
        let tables = parse_knex(content, "migrations/001_accounts.js");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "accounts");
        assert_eq!(tables[0].columns.len(), 2);
    }
}
