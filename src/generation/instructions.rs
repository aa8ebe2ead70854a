//! Instruction bundle and output contract for SQL generation.

use serde::Deserialize;
use serde_json::{json, Value};
use toon_format::EncodeOptions;

use super::{GenerationError, GenerationResult};
use crate::completion::OutputSchema;

/// Catalog-browsing tools the model may call without approval.
pub const CATALOG_TOOLS: [&str; 3] = ["list-catalogs", "list-schemas", "list-tables"];

pub const OUTPUT_SCHEMA_NAME: &str = "create_dynamic_query_output";

const SQL_QUERY_DESCRIPTION: &str = "The SQL query to be executed for the dynamic query.";

/// Result shape every generated query must follow: a single JSON value with
/// `columns` metadata and `data` rows.
const SQL_TEMPLATE: &str = r#"WITH data_cte AS (
  SELECT
    -- columns requested by the prompt
  FROM catalog.schema.table AS cst
  -- joins, also written as catalog.schema.table
  -- filters, ordering and limits requested by the prompt
),
columns_array AS (
  SELECT ARRAY_AGG(col) AS cols FROM (
    SELECT MAP(
      ARRAY['name', 'type', 'label'],
      ARRAY['Full Name', 'varchar', 'Full Name']
    ) AS col
    UNION ALL
    SELECT MAP(
      ARRAY['name', 'type', 'label'],
      ARRAY['Street Address', 'varchar', 'Street Address']
    )
  )
),
data_array AS (
  SELECT ARRAY_AGG(
    MAP(
      ARRAY['Full Name', 'Street Address'],
      ARRAY[
        CAST("Full Name" AS VARCHAR),
        CAST("Street Address" AS VARCHAR)
      ]
    )
  ) AS data
  FROM data_cte
)
SELECT CAST(
  MAP(
    ARRAY['columns', 'data'],
    ARRAY[
      CAST(cols AS JSON),
      CAST(data AS JSON)
    ]
  ) AS JSON
) AS result
FROM columns_array, data_array;"#;

/// The instruction bundle as a JSON value.
pub fn bundle() -> Value {
    json!({
        "role": "You are a professional TrinoDB SQL query developer.",
        "expectations": [
            "Call `list-catalogs` first to see the connected databases.",
            "Call `list-schemas` second to see the schemas of those databases.",
            "Call `list-tables` third to see the tables of those schemas.",
            "Refer to tables as {catalog}.{schema}.{table} in your queries.",
            "Fulfil the user's request without error.",
            "Use double quotes to quote column identifiers.",
            "Do not quote catalogs, schemas or tables.",
            "Only use tables and columns you have discovered through the tools. Never invent columns or tables.",
            "Put only the SQL query in the `sql_query` field of the output JSON.",
        ],
        "sql_template": SQL_TEMPLATE,
        "sql_rules": [
            "Only generate SQL that TrinoDB accepts.",
            "Generate efficient queries.",
            "Only use tables and columns that exist in the database schema.",
            "Keep the shape of `sql_template`; change the selected columns, joins, filters, ordering and limits to match the user's prompt.",
        ],
    })
}

/// The instruction bundle rendered as TOON text, one space per level.
pub fn render() -> GenerationResult<String> {
    let options = EncodeOptions::new().with_spaces(1);
    Ok(toon_format::encode(&bundle(), &options)?)
}

/// The strict output schema: an object with exactly one string `sql_query`.
pub fn output_schema() -> OutputSchema {
    OutputSchema {
        name: OUTPUT_SCHEMA_NAME.to_string(),
        description: "The output for create dynamic query".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "sql_query": {
                    "type": "string",
                    "description": SQL_QUERY_DESCRIPTION,
                }
            },
            "required": ["sql_query"],
            "additionalProperties": false,
        }),
        strict: true,
    }
}

/// Provider output that passed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedQuery {
    pub sql_query: String,
}

/// Validate provider output text against the output schema.
pub fn parse_output(output_text: &str) -> GenerationResult<GeneratedQuery> {
    let parsed: GeneratedQuery = serde_json::from_str(output_text)
        .map_err(|e| GenerationError::InvalidOutput(e.to_string()))?;
    if parsed.sql_query.trim().is_empty() {
        return Err(GenerationError::InvalidOutput("sql_query is empty".into()));
    }
    Ok(parsed)
}
