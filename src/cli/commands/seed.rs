//! Developer seed data: a small but complete grant and collection exercising
//! conditions, validations, choice data sources and add-another containers.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::{Organisation, Role, User, UserRole};
use crate::expr::ManagedExpression;
use crate::schema::authoring::QuestionSpec;
use crate::schema::{Collection, Grant, QuestionDataType};
use crate::store::repository::{collections, grants, organisations, users};

pub async fn seed_command(pool: &SqlitePool) -> Result<()> {
    if grants::get_grant_by_name(pool, "Chessboards in parks")
        .await?
        .is_some()
    {
        println!("Seed data already present");
        return Ok(());
    }

    let grant = Grant {
        id: Uuid::new_v4(),
        name: "Chessboards in parks".to_string(),
        is_live: true,
    };
    grants::save_grant(pool, &grant).await?;

    let organisation = Organisation {
        id: Uuid::new_v4(),
        name: "Parkside Community Trust".to_string(),
        external_id: "ORG-PARKSIDE".to_string(),
    };
    organisations::save_organisation(pool, &organisation).await?;

    let admin = seed_user(pool, "admin@communities.gov.localhost", "Seed Admin").await?;
    users::add_user_role(
        pool,
        &UserRole {
            id: Uuid::new_v4(),
            user_id: admin.id,
            organisation_id: None,
            grant_id: None,
            role: Role::Admin,
        },
    )
    .await?;

    let recipient = seed_user(pool, "recipient@parkside.localhost", "Seed Recipient").await?;
    users::add_user_role(
        pool,
        &UserRole {
            id: Uuid::new_v4(),
            user_id: recipient.id,
            organisation_id: Some(organisation.id),
            grant_id: Some(grant.id),
            role: Role::GrantRecipient,
        },
    )
    .await?;

    let certifier = seed_user(pool, "certifier@communities.gov.localhost", "Seed Certifier").await?;
    users::add_user_role(
        pool,
        &UserRole {
            id: Uuid::new_v4(),
            user_id: certifier.id,
            organisation_id: None,
            grant_id: Some(grant.id),
            role: Role::Certifier,
        },
    )
    .await?;

    let collection = build_collection(grant.id, admin.id)?;
    collections::save_collection(pool, &collection).await?;

    println!("Seeded grant '{}' ({})", grant.name, grant.id);
    println!(
        "Seeded collection '{}' ({} v{})",
        collection.name, collection.id, collection.version
    );
    println!("Seeded organisation '{}' ({})", organisation.name, organisation.external_id);
    println!("Seeded users: {}, {}, {}", admin.email_address, recipient.email_address, certifier.email_address);
    Ok(())
}

async fn seed_user(pool: &SqlitePool, email: &str, name: &str) -> Result<User> {
    let user = User {
        id: Uuid::new_v4(),
        email_address: email.to_string(),
        full_name: name.to_string(),
        created_at_utc: Utc::now(),
        roles: Vec::new(),
    };
    users::save_user(pool, &user).await?;
    Ok(user)
}

fn build_collection(grant_id: Uuid, created_by: Uuid) -> Result<Collection> {
    let mut collection = Collection::new(grant_id, "End of year report", created_by, Utc::now());
    collection.requires_certification = true;
    let section_id = collection.sections[0].id;

    let form_id = collection
        .add_form(section_id, "About your chessboards")
        .context("seed form")?;

    let has_board = collection.add_question(
        form_id,
        None,
        QuestionSpec {
            text: "Is there a chessboard in your park?".to_string(),
            name: "has chessboard".to_string(),
            hint: None,
            guidance: None,
            data_type: QuestionDataType::YesNo,
            items: Vec::new(),
        },
    )?;

    let condition_q = collection.add_question(
        form_id,
        None,
        QuestionSpec {
            text: "What condition is the chessboard in?".to_string(),
            name: "chessboard condition".to_string(),
            hint: Some("Pick the closest match".to_string()),
            guidance: None,
            data_type: QuestionDataType::SingleChoice,
            items: vec![
                ("good".to_string(), "Good".to_string()),
                ("fair".to_string(), "Fair".to_string()),
                ("poor".to_string(), "Poor".to_string()),
            ],
        },
    )?;
    collection.add_managed_condition(
        condition_q,
        &ManagedExpression::IsYes {
            question_id: has_board,
        },
    )?;

    let players = collection.add_question(
        form_id,
        None,
        QuestionSpec {
            text: "How many people play each week?".to_string(),
            name: "weekly players".to_string(),
            hint: None,
            guidance: None,
            data_type: QuestionDataType::Integer,
            items: Vec::new(),
        },
    )?;
    collection.add_managed_condition(
        players,
        &ManagedExpression::IsYes {
            question_id: has_board,
        },
    )?;
    collection.add_managed_validation(
        players,
        &ManagedExpression::Between {
            question_id: players,
            minimum_value: 0,
            maximum_value: 500,
            inclusive: true,
        },
    )?;

    // Usable chess sets, only asked while the board is in playable condition.
    let playable_items: Vec<_> = {
        let question = collection
            .find_question(condition_q)
            .context("seed choice question")?;
        let data_source = question.data_source.as_ref().context("seed data source")?;
        data_source
            .items
            .iter()
            .filter(|item| item.key != "poor")
            .cloned()
            .collect()
    };
    let sets = collection.add_question(
        form_id,
        None,
        QuestionSpec {
            text: "How many chess sets do you provide?".to_string(),
            name: "chess sets".to_string(),
            hint: None,
            guidance: None,
            data_type: QuestionDataType::Integer,
            items: Vec::new(),
        },
    )?;
    collection.add_managed_condition(
        sets,
        &ManagedExpression::AnyOf {
            question_id: condition_q,
            items: playable_items,
        },
    )?;
    collection.add_managed_validation(
        sets,
        &ManagedExpression::GreaterThan {
            question_id: sets,
            minimum_value: 0,
            inclusive: true,
        },
    )?;

    // Repeating container for each park location.
    let locations = collection.add_group(form_id, None, "Park locations")?;
    collection.add_question(
        form_id,
        Some(locations),
        QuestionSpec {
            text: "What is the name of the park?".to_string(),
            name: "park name".to_string(),
            hint: None,
            guidance: None,
            data_type: QuestionDataType::TextSingleLine,
            items: Vec::new(),
        },
    )?;
    let boards = collection.add_question(
        form_id,
        Some(locations),
        QuestionSpec {
            text: "How many boards are at this park?".to_string(),
            name: "boards at park".to_string(),
            hint: None,
            guidance: None,
            data_type: QuestionDataType::Integer,
            items: Vec::new(),
        },
    )?;
    collection.add_managed_validation(
        boards,
        &ManagedExpression::GreaterThan {
            question_id: boards,
            minimum_value: 0,
            inclusive: false,
        },
    )?;
    collection.set_add_another(locations, true)?;

    let contact_form = collection.add_form(section_id, "Contact details")?;
    collection.add_question(
        contact_form,
        None,
        QuestionSpec {
            text: "What email address should we use to contact you?".to_string(),
            name: "contact email".to_string(),
            hint: None,
            guidance: None,
            data_type: QuestionDataType::Email,
            items: Vec::new(),
        },
    )?;

    Ok(collection)
}
