//! Demo queries and scenarios for the retail simulation.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::connection::{Connection, Cursor};
use crate::context::Context;
use crate::core::{Result, Value};
use crate::query::QueryDef;
use crate::result::QueryResult;
use crate::scenario::{QueryMap, ScenarioDef};

const DEPARTMENT_WORDS: &[&str] = &[
    "logistics", "billing", "retail", "wholesale", "support", "export",
];

const PERSON_NAMES: &[&str] = &[
    "Alice Carver",
    "Ben Holt",
    "Clara Osei",
    "Daniel Reyes",
    "Edith Kowalski",
    "Farid Azimov",
];

const SALE_SUBJECTS: &[&str] = &[
    "quarterly restock",
    "clearance batch",
    "priority order",
    "seasonal bundle",
];

pub fn register(ctx: &Context) -> Result<()> {
    ctx.add_query(QueryDef::user("count_sales", count_sales))?;

    ctx.add_scenario(
        ScenarioDef::user("create_department", create_department).infuse(true),
    )?;
    ctx.add_scenario(
        ScenarioDef::user("create_employee", create_employee).infuse(true),
    )?;
    ctx.add_scenario(ScenarioDef::user("create_sale", create_sale).infuse(true))?;
    ctx.add_scenario(
        ScenarioDef::user("sales_statistics", sales_statistics).infuse(true),
    )?;

    Ok(())
}

fn count_sales(cursor: &mut dyn Cursor, _params: &[Value]) -> Result<Option<QueryResult>> {
    cursor.execute("SELECT count(*) FROM sales", &[])?;
    Ok(Some(QueryResult::from_cursor(cursor)?))
}

fn create_department(conn: &mut dyn Connection, queries: &QueryMap<'_>) -> Result<()> {
    let name = {
        let mut rng = rand::thread_rng();
        format!(
            "{} {}",
            DEPARTMENT_WORDS.choose(&mut rng).unwrap(),
            rng.gen_range(1..100)
        )
    };

    let mut cursor = conn.cursor()?;
    queries.call("insert_department", cursor.as_mut(), &[Value::Text(name)])?;
    Ok(())
}

fn create_employee(conn: &mut dyn Connection, queries: &QueryMap<'_>) -> Result<()> {
    let department = {
        let mut cursor = conn.cursor()?;
        queries
            .call("select_departments_return_random", cursor.as_mut(), &[])?
            .and_then(|r| r.first().cloned())
    };

    let Some(department) = department else {
        info!("Cannot hire anyone because there are no departments");
        return Ok(());
    };

    let name = {
        let mut rng = rand::thread_rng();
        PERSON_NAMES.choose(&mut rng).unwrap().to_string()
    };

    let mut cursor = conn.cursor()?;
    queries.call(
        "insert_employee",
        cursor.as_mut(),
        &[Value::Text(name), department[0].clone()],
    )?;
    Ok(())
}

fn create_sale(conn: &mut dyn Connection, queries: &QueryMap<'_>) -> Result<()> {
    let employee = {
        let mut cursor = conn.cursor()?;
        queries
            .call("select_employees_return_random", cursor.as_mut(), &[])?
            .and_then(|r| r.first().cloned())
    };

    let Some(employee) = employee else {
        info!("Cannot close a sale because there are no employees");
        return Ok(());
    };

    let (subject, amount) = {
        let mut rng = rand::thread_rng();
        (
            SALE_SUBJECTS.choose(&mut rng).unwrap().to_string(),
            rng.gen_range(10..=5_000i64),
        )
    };

    let mut cursor = conn.cursor()?;
    queries.call(
        "insert_sale",
        cursor.as_mut(),
        &[employee[0].clone(), Value::Text(subject), Value::Integer(amount)],
    )?;
    Ok(())
}

fn sales_statistics(conn: &mut dyn Connection, queries: &QueryMap<'_>) -> Result<()> {
    let mut cursor = conn.cursor()?;
    let sales = queries
        .call("count_sales", cursor.as_mut(), &[])?
        .and_then(|r| r.first().map(|row| row[0].clone()));

    if let Some(count) = sales {
        info!("Current number of sales in the database is {}", count);
    }
    Ok(())
}
