//! Initial database migration.
//!
//! Creates the enums, users, approval rules, expenses and the approval
//! decision ledger.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: USERS
        // ============================================================
        db.execute_unprepared(USERS_SQL).await?;

        // ============================================================
        // PART 3: APPROVAL RULES
        // ============================================================
        db.execute_unprepared(APPROVAL_RULES_SQL).await?;
        db.execute_unprepared(APPROVAL_RULE_APPROVERS_SQL).await?;

        // ============================================================
        // PART 4: EXPENSES & LEDGER
        // ============================================================
        db.execute_unprepared(EXPENSES_SQL).await?;
        db.execute_unprepared(APPROVAL_DECISIONS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE user_role AS ENUM ('admin', 'manager', 'employee');

CREATE TYPE expense_status AS ENUM ('pending', 'approved', 'rejected');

CREATE TYPE expense_category AS ENUM ('travel', 'food', 'office_supplies', 'other');

CREATE TYPE approval_decision AS ENUM ('approve', 'reject');
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    email VARCHAR(255) NOT NULL UNIQUE,
    full_name VARCHAR(255) NOT NULL,
    role user_role NOT NULL DEFAULT 'employee',
    manager_id UUID REFERENCES users(id) ON DELETE SET NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_not_own_manager CHECK (manager_id IS NULL OR manager_id <> id)
);

CREATE INDEX idx_users_manager ON users(manager_id) WHERE manager_id IS NOT NULL;
";

const APPROVAL_RULES_SQL: &str = r"
CREATE TABLE approval_rules (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    description TEXT,
    is_manager_approver BOOLEAN NOT NULL DEFAULT false,
    is_sequential BOOLEAN NOT NULL DEFAULT false,
    minimum_approval_percentage SMALLINT,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_percentage_range CHECK (
        minimum_approval_percentage IS NULL
        OR (minimum_approval_percentage > 0 AND minimum_approval_percentage <= 100)
    )
);

CREATE INDEX idx_approval_rules_active ON approval_rules(name) WHERE is_active = true;
";

const APPROVAL_RULE_APPROVERS_SQL: &str = r"
CREATE TABLE approval_rule_approvers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    rule_id UUID NOT NULL REFERENCES approval_rules(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES users(id),
    position SMALLINT NOT NULL,
    is_required BOOLEAN NOT NULL DEFAULT false,
    CONSTRAINT uq_rule_approver UNIQUE (rule_id, user_id),
    CONSTRAINT uq_rule_position UNIQUE (rule_id, position)
);
";

const EXPENSES_SQL: &str = r"
CREATE TABLE expenses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    owner_id UUID NOT NULL REFERENCES users(id),
    amount NUMERIC(19, 4) NOT NULL,
    currency CHAR(3) NOT NULL,
    category expense_category NOT NULL,
    description TEXT NOT NULL,
    expense_date DATE NOT NULL,
    status expense_status NOT NULL DEFAULT 'pending',
    rule_id UUID NOT NULL REFERENCES approval_rules(id),
    rule_snapshot JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_positive CHECK (amount > 0)
);

CREATE INDEX idx_expenses_owner ON expenses(owner_id, created_at DESC);
CREATE INDEX idx_expenses_pending ON expenses(created_at) WHERE status = 'pending';
CREATE INDEX idx_expenses_snapshot_approvers ON expenses USING GIN ((rule_snapshot -> 'approvers'));
";

const APPROVAL_DECISIONS_SQL: &str = r"
-- One row per approver per expense; a repeated decision updates the row in place.
CREATE TABLE approval_decisions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    approver_id UUID NOT NULL REFERENCES users(id),
    decision approval_decision NOT NULL,
    comment TEXT,
    decided_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_decision_per_approver UNIQUE (expense_id, approver_id)
);

CREATE INDEX idx_decisions_expense ON approval_decisions(expense_id, created_at);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS approval_decisions CASCADE;
DROP TABLE IF EXISTS expenses CASCADE;
DROP TABLE IF EXISTS approval_rule_approvers CASCADE;
DROP TABLE IF EXISTS approval_rules CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TYPE IF EXISTS approval_decision;
DROP TYPE IF EXISTS expense_category;
DROP TYPE IF EXISTS expense_status;
DROP TYPE IF EXISTS user_role;
";
