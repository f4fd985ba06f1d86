//! Database seeder for Expensa development and testing.
//!
//! Seeds demo users with a reporting line, the two sample approval rules,
//! a handful of expenses in every status, and prints development tokens
//! for each user.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use expensa_core::approval::{Decision, RuleApprover};
use expensa_core::expense::NewExpense;
use expensa_core::identity::UserRole;
use expensa_db::entities::users;
use expensa_db::repositories::{
    ApprovalRepository, ApprovalRuleRepository, CreateApprovalRuleInput, CreateUserInput,
    ExpenseRepository, StoredRule, UserRepository,
};
use expensa_db::{RetryPolicy, connect};
use expensa_shared::types::{ApprovalRuleId, PageRequest, UserId};
use expensa_shared::{AppConfig, JwtConfig, JwtService};

/// Development tokens stay valid for 30 days.
const DEV_TOKEN_MINUTES: i64 = 60 * 24 * 30;

struct Team {
    admin: users::Model,
    manager: users::Model,
    charlie: users::Model,
    diana: users::Model,
    finance: users::Model,
    director: users::Model,
    cfo: users::Model,
}

impl Team {
    fn all(&self) -> [&users::Model; 7] {
        [
            &self.admin,
            &self.manager,
            &self.charlie,
            &self.diana,
            &self.finance,
            &self.director,
            &self.cfo,
        ]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expensa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    println!("Connecting to database...");
    let db = connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    let user_repo = UserRepository::new(db.clone());
    let rule_repo = ApprovalRuleRepository::new(db.clone());
    let expense_repo = ExpenseRepository::new(db.clone());
    let approval_repo = ApprovalRepository::new(db, RetryPolicy::from(config.approval));

    println!("Seeding users...");
    let team = seed_users(&user_repo).await?;

    println!("Seeding approval rules...");
    let (misc_rule, project_rule) = seed_rules(&rule_repo, &team).await?;

    println!("Seeding expenses...");
    seed_expenses(&expense_repo, &approval_repo, &team, misc_rule, project_rule).await?;

    let jwt = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: DEV_TOKEN_MINUTES,
        leeway_secs: config.jwt.leeway_secs,
    });

    println!("\nDevelopment tokens:");
    for user in team.all() {
        let role = UserRole::from(user.role.clone());
        let token = jwt
            .generate_access_token(user.id, role.as_str())
            .context("failed to sign development token")?;
        println!("  {:<28} {:<8} {token}", user.email, role.as_str());
    }

    println!("\nSeeding complete!");
    Ok(())
}

async fn ensure_user(
    repo: &UserRepository,
    email: &str,
    full_name: &str,
    role: UserRole,
    manager: Option<&users::Model>,
) -> anyhow::Result<users::Model> {
    if let Some(existing) = repo.find_by_email(email).await? {
        println!("  {email} already exists, skipping...");
        return Ok(existing);
    }

    let user = repo
        .create(CreateUserInput {
            email: email.to_string(),
            full_name: full_name.to_string(),
            role,
            manager_id: manager.map(|m| UserId::from(m.id)),
        })
        .await
        .with_context(|| format!("failed to insert user {email}"))?;
    println!("  Created {full_name} <{email}>");
    Ok(user)
}

async fn seed_users(repo: &UserRepository) -> anyhow::Result<Team> {
    let admin = ensure_user(repo, "admin@company.com", "Alice Admin", UserRole::Admin, None).await?;
    let manager = ensure_user(
        repo,
        "manager@company.com",
        "Bob Manager",
        UserRole::Manager,
        Some(&admin),
    )
    .await?;
    let charlie = ensure_user(
        repo,
        "charlie@company.com",
        "Charlie Brown",
        UserRole::Employee,
        Some(&manager),
    )
    .await?;
    let diana = ensure_user(
        repo,
        "diana@company.com",
        "Diana Miller",
        UserRole::Employee,
        Some(&manager),
    )
    .await?;
    let finance = ensure_user(
        repo,
        "john@company.com",
        "John Smith (Finance)",
        UserRole::Manager,
        None,
    )
    .await?;
    let director = ensure_user(
        repo,
        "mitchell@company.com",
        "Mitchell Green (Director)",
        UserRole::Manager,
        None,
    )
    .await?;
    let cfo = ensure_user(
        repo,
        "andreas@company.com",
        "Andreas Wolfer (CFO)",
        UserRole::Manager,
        None,
    )
    .await?;

    Ok(Team {
        admin,
        manager,
        charlie,
        diana,
        finance,
        director,
        cfo,
    })
}

async fn ensure_rule(
    repo: &ApprovalRuleRepository,
    existing: &[StoredRule],
    input: CreateApprovalRuleInput,
) -> anyhow::Result<ApprovalRuleId> {
    if let Some(found) = existing.iter().find(|r| r.rule.name == input.name) {
        println!("  Rule \"{}\" already exists, skipping...", input.name);
        return Ok(found.rule.id);
    }

    let name = input.name.clone();
    let stored = repo
        .create_rule(input)
        .await
        .with_context(|| format!("failed to create rule {name}"))?;
    println!("  Created rule \"{name}\"");
    Ok(stored.rule.id)
}

async fn seed_rules(
    repo: &ApprovalRuleRepository,
    team: &Team,
) -> anyhow::Result<(ApprovalRuleId, ApprovalRuleId)> {
    let existing = repo.list_rules().await?;

    let misc = ensure_rule(
        repo,
        &existing,
        CreateApprovalRuleInput {
            name: "Miscellaneous Expenses Over $100".to_string(),
            description: Some("Manager first, then finance".to_string()),
            is_manager_approver: true,
            approvers: vec![RuleApprover::required(team.finance.id.into())],
            is_sequential: true,
            minimum_approval_percentage: None,
        },
    )
    .await?;

    let project = ensure_rule(
        repo,
        &existing,
        CreateApprovalRuleInput {
            name: "Project Team Approvals (Parallel)".to_string(),
            description: Some("Director must sign; 60% of the panel approves".to_string()),
            is_manager_approver: false,
            approvers: vec![
                RuleApprover::optional(team.finance.id.into()),
                RuleApprover::required(team.director.id.into()),
                RuleApprover::optional(team.cfo.id.into()),
            ],
            is_sequential: false,
            minimum_approval_percentage: Some(60),
        },
    )
    .await?;

    Ok((misc, project))
}

fn expense(
    amount: Decimal,
    currency: &str,
    category: &str,
    description: &str,
    date: (i32, u32, u32),
) -> anyhow::Result<NewExpense> {
    Ok(NewExpense {
        amount,
        currency: currency.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .with_context(|| format!("invalid date {date:?}"))?,
    })
}

async fn seed_expenses(
    expenses: &ExpenseRepository,
    approvals: &ApprovalRepository,
    team: &Team,
    misc_rule: ApprovalRuleId,
    project_rule: ApprovalRuleId,
) -> anyhow::Result<()> {
    let charlie = UserId::from(team.charlie.id);
    let diana = UserId::from(team.diana.id);
    let manager = UserId::from(team.manager.id);
    let finance = UserId::from(team.finance.id);

    let already = expenses
        .list_expenses(charlie, &PageRequest::default())
        .await?
        .meta
        .total;
    if already > 0 {
        println!("  Expenses already exist, skipping...");
        return Ok(());
    }

    expenses
        .create_expense(
            charlie,
            misc_rule,
            expense(Decimal::new(56700, 2), "USD", "Food", "Client Dinner Q4", (2025, 10, 1))?,
        )
        .await?;

    expenses
        .create_expense(
            diana,
            project_rule,
            expense(
                Decimal::new(45050, 2),
                "EUR",
                "Office Supplies",
                "New Office Monitors",
                (2025, 9, 28),
            )?,
        )
        .await?;

    let taxi = expenses
        .create_expense(
            charlie,
            misc_rule,
            expense(Decimal::new(7500, 2), "USD", "Travel", "Taxi to airport", (2025, 9, 25))?,
        )
        .await?;
    approvals
        .submit_decision(taxi.id, manager, Decision::Approve, None)
        .await?;
    approvals
        .submit_decision(taxi.id, finance, Decision::Approve, Some("Receipt attached".to_string()))
        .await?;

    let poster = expenses
        .create_expense(
            diana,
            misc_rule,
            expense(
                Decimal::new(3520, 2),
                "USD",
                "Other",
                "Project poster printing",
                (2025, 9, 22),
            )?,
        )
        .await?;
    approvals
        .submit_decision(
            poster.id,
            manager,
            Decision::Reject,
            Some("Not covered by the project budget".to_string()),
        )
        .await?;

    println!("  Created 4 expenses (2 pending, 1 approved, 1 rejected)");
    Ok(())
}
