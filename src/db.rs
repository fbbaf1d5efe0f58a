use async_trait::async_trait;
use deadpool_postgres::{Config, Object, Pool, PoolConfig, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{Comment, Follow, Group, Post, User};
use crate::store::{PostFilter, Store};

const POST_COLUMNS: &str =
    "p.id, p.text, p.author_id, u.username, p.group_id, p.image, p.created_at";
const POST_FROM: &str = "FROM posts p JOIN users u ON u.id = p.author_id";

const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.author_id, u.username, c.text, c.created_at";

/// 同時刻の行が OFFSET をまたいで重複・欠落しないよう id で順序を固定する。
const POST_ORDER: &str = "ORDER BY p.created_at DESC, p.id DESC";
const COMMENT_ORDER: &str = "ORDER BY c.created_at DESC, c.id DESC";

/// PostgreSQL への接続プールを握るリポジトリ層。
/// Deadpool の `Pool` を内部に保持し、`Store` トレイトを実装する。
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// 接続プールを構築し、起動時に疎通確認まで実施する。
    pub async fn new(config: DatabaseConfig) -> Result<Self, ApiError> {
        info!("Creating PostgreSQL connection pool for host: {}:{}", config.host, config.port);

        let pool = Self::create_pool(config)?;

        let db = Database { pool };
        db.test_connection().await?;

        Ok(db)
    }

    fn create_pool(config: DatabaseConfig) -> Result<Pool, ApiError> {
        let mut pg_config = Config::new();

        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);
        pg_config.connect_timeout = Some(config.connection_timeout);

        pg_config.ssl_mode = Some(match config.ssl_mode.as_str() {
            "disable" => deadpool_postgres::SslMode::Disable,
            "prefer" => deadpool_postgres::SslMode::Prefer,
            "require" => deadpool_postgres::SslMode::Require,
            other => {
                warn!("Unknown SSL mode '{}', defaulting to 'require'", other);
                deadpool_postgres::SslMode::Require
            }
        });

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(config.max_connections as usize);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pg_config.pool = Some(pool_config);

        let tls_connector = TlsConnector::builder().build().map_err(|e| {
            error!("Failed to create TLS connector: {}", e);
            ApiError::Database(format!("TLS connector creation failed: {}", e))
        })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config.create_pool(Some(Runtime::Tokio1), tls).map_err(|e| {
            error!("Failed to create connection pool: {}", e);
            ApiError::Database(format!("Connection pool creation failed: {}", e))
        })
    }

    /// プールから接続を借りる小さなラッパー。
    async fn get_connection(&self) -> Result<Object, ApiError> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// アプリ起動時にテーブル群を CREATE する簡易マイグレーター。
    /// 何度実行しても結果が変わらないよう、すべて `IF NOT EXISTS` 付き。
    pub async fn migrate(&self) -> Result<(), ApiError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        let statements: [(&str, &str); 10] = [
            (
                "users table",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id UUID PRIMARY KEY,
                    username VARCHAR(150) NOT NULL UNIQUE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "groups table",
                r#"
                CREATE TABLE IF NOT EXISTS post_groups (
                    id UUID PRIMARY KEY,
                    title VARCHAR(200) NOT NULL,
                    slug VARCHAR(50) NOT NULL UNIQUE,
                    description TEXT NOT NULL
                )
                "#,
            ),
            (
                "posts table",
                r#"
                CREATE TABLE IF NOT EXISTS posts (
                    id UUID PRIMARY KEY,
                    text TEXT NOT NULL,
                    author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    group_id UUID REFERENCES post_groups(id) ON DELETE SET NULL,
                    image VARCHAR(255),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "comments table",
                r#"
                CREATE TABLE IF NOT EXISTS comments (
                    id UUID PRIMARY KEY,
                    post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    text TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            ),
            (
                "follows table",
                r#"
                CREATE TABLE IF NOT EXISTS follows (
                    id UUID PRIMARY KEY,
                    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    author_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    CONSTRAINT unique_follow UNIQUE (user_id, author_id),
                    CONSTRAINT no_self_follow CHECK (user_id <> author_id)
                )
                "#,
            ),
            (
                "posts created_at index",
                "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC)",
            ),
            (
                "posts author_id index",
                "CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id)",
            ),
            (
                "posts group_id index",
                "CREATE INDEX IF NOT EXISTS idx_posts_group_id ON posts(group_id)",
            ),
            (
                "comments post_id index",
                "CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id, created_at DESC)",
            ),
            (
                "follows author_id index",
                "CREATE INDEX IF NOT EXISTS idx_follows_author_id ON follows(author_id)",
            ),
        ];

        for (name, statement) in statements {
            client.execute(statement, &[]).await.map_err(|e| {
                error!("Failed to create {}: {}", name, e);
                ApiError::Database(format!("Migration step '{}' failed: {}", name, e))
            })?;
            debug!("Migration step applied: {}", name);
        }

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// `Database::new` 直後にプール全体が機能するかの確認に使う。
    pub async fn test_connection(&self) -> Result<(), ApiError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database connection test failed: {}", e);
            ApiError::Database(format!("Connection test failed: {}", e))
        })?;

        info!("Database connection test successful");
        Ok(())
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        created_at: row.get(2),
    }
}

fn group_from_row(row: &Row) -> Group {
    Group {
        id: row.get(0),
        title: row.get(1),
        slug: row.get(2),
        description: row.get(3),
    }
}

fn post_from_row(row: &Row) -> Post {
    Post {
        id: row.get(0),
        text: row.get(1),
        author_id: row.get(2),
        author: row.get(3),
        group_id: row.get(4),
        image: row.get(5),
        created_at: row.get(6),
    }
}

fn comment_from_row(row: &Row) -> Comment {
    Comment {
        id: row.get(0),
        post_id: row.get(1),
        author_id: row.get(2),
        author: row.get(3),
        text: row.get(4),
        created_at: row.get(5),
    }
}

/// フィードごとの WHERE 句。バインドする UUID は常に `$1`。
fn filter_clause(filter: PostFilter) -> (&'static str, Option<Uuid>) {
    match filter {
        PostFilter::All => ("", None),
        PostFilter::Group(group_id) => ("WHERE p.group_id = $1", Some(group_id)),
        PostFilter::Author(author_id) => ("WHERE p.author_id = $1", Some(author_id)),
        PostFilter::FollowedBy(user_id) => (
            "WHERE p.author_id <> $1 \
             AND p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = $1)",
            Some(user_id),
        ),
    }
}

#[async_trait]
impl Store for Database {
    /// `SELECT 1` を投げて DB が生きているか確認する。
    async fn health_check(&self) -> ApiResult<()> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database health check failed: {}", e);
            ApiError::Database(format!("Health check failed: {}", e))
        })?;

        Ok(())
    }

    async fn insert_user(&self, user: &User) -> ApiResult<User> {
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO users (id, username, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, username, created_at
        "#;

        let row = client
            .query_one(query, &[&user.id, &user.username, &user.created_at])
            .await
            .map_err(ApiError::from)?;

        let created = user_from_row(&row);
        info!("Created user with id: {}", created.id);
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let client = self.get_connection().await?;
        let query = "SELECT id, username, created_at FROM users WHERE username = $1";

        let row = client.query_opt(query, &[&username]).await.map_err(ApiError::from)?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// テーブル定義側で `ON DELETE CASCADE` を付けているため、
    /// 投稿・コメント・フォロー関係も同時に消える。
    async fn delete_user(&self, user_id: Uuid) -> ApiResult<bool> {
        let client = self.get_connection().await?;

        let rows_affected = client
            .execute("DELETE FROM users WHERE id = $1", &[&user_id])
            .await
            .map_err(ApiError::from)?;

        if rows_affected > 0 {
            info!("Deleted user with id: {}", user_id);
        }
        Ok(rows_affected > 0)
    }

    async fn insert_group(&self, group: &Group) -> ApiResult<Group> {
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO post_groups (id, title, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, slug, description
        "#;

        let row = client
            .query_one(query, &[&group.id, &group.title, &group.slug, &group.description])
            .await
            .map_err(ApiError::from)?;

        let created = group_from_row(&row);
        info!("Created group '{}' with id: {}", created.slug, created.id);
        Ok(created)
    }

    async fn find_group_by_slug(&self, slug: &str) -> ApiResult<Option<Group>> {
        let client = self.get_connection().await?;
        let query = "SELECT id, title, slug, description FROM post_groups WHERE slug = $1";

        let row = client.query_opt(query, &[&slug]).await.map_err(ApiError::from)?;

        Ok(row.as_ref().map(group_from_row))
    }

    async fn find_group_by_id(&self, group_id: Uuid) -> ApiResult<Option<Group>> {
        let client = self.get_connection().await?;
        let query = "SELECT id, title, slug, description FROM post_groups WHERE id = $1";

        let row = client.query_opt(query, &[&group_id]).await.map_err(ApiError::from)?;

        Ok(row.as_ref().map(group_from_row))
    }

    async fn list_groups(&self) -> ApiResult<Vec<Group>> {
        let client = self.get_connection().await?;
        let query = "SELECT id, title, slug, description FROM post_groups ORDER BY title";

        let rows = client.query(query, &[]).await.map_err(ApiError::from)?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    /// `ON DELETE SET NULL` により、所属していた投稿はグループなしで残る。
    async fn delete_group(&self, group_id: Uuid) -> ApiResult<bool> {
        let client = self.get_connection().await?;

        let rows_affected = client
            .execute("DELETE FROM post_groups WHERE id = $1", &[&group_id])
            .await
            .map_err(ApiError::from)?;

        Ok(rows_affected > 0)
    }

    async fn insert_post(&self, post: &Post) -> ApiResult<Post> {
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO posts (id, text, author_id, group_id, image, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#;

        client
            .execute(
                query,
                &[&post.id, &post.text, &post.author_id, &post.group_id, &post.image, &post.created_at],
            )
            .await
            .map_err(ApiError::from)?;

        info!("Created post with id: {}", post.id);
        Ok(post.clone())
    }

    async fn update_post(&self, post: &Post) -> ApiResult<Post> {
        let client = self.get_connection().await?;

        let rows_affected = client
            .execute(
                "UPDATE posts SET text = $1, group_id = $2, image = $3 WHERE id = $4",
                &[&post.text, &post.group_id, &post.image, &post.id],
            )
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            return Err(ApiError::NotFound(format!("Post with id {}", post.id)));
        }

        info!("Updated post with id: {}", post.id);
        Ok(post.clone())
    }

    async fn find_post(&self, post_id: Uuid) -> ApiResult<Option<Post>> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} {} WHERE p.id = $1", POST_COLUMNS, POST_FROM);

        let row = client.query_opt(&query, &[&post_id]).await.map_err(ApiError::from)?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn count_posts(&self, filter: PostFilter) -> ApiResult<u64> {
        let client = self.get_connection().await?;
        let (clause, bound) = filter_clause(filter);

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref id) = bound {
            params.push(id);
        }

        let query = format!("SELECT COUNT(*) FROM posts p {}", clause);
        let row = client.query_one(&query, &params).await.map_err(ApiError::from)?;
        let count: i64 = row.get(0);

        Ok(count.max(0) as u64)
    }

    /// 動的に組み立てた WHERE 句の後ろに LIMIT/OFFSET のプレースホルダを続ける。
    async fn list_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> ApiResult<Vec<Post>> {
        let client = self.get_connection().await?;
        let (clause, bound) = filter_clause(filter);

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(ref id) = bound {
            params.push(id);
        }

        let query = format!(
            "SELECT {} {} {} {} LIMIT ${} OFFSET ${}",
            POST_COLUMNS,
            POST_FROM,
            clause,
            POST_ORDER,
            params.len() + 1,
            params.len() + 2
        );
        params.push(&limit);
        params.push(&offset);

        let rows = client.query(&query, &params).await.map_err(ApiError::from)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn insert_comment(&self, comment: &Comment) -> ApiResult<Comment> {
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO comments (id, post_id, author_id, text, created_at)
            VALUES ($1, $2, $3, $4, $5)
        "#;

        client
            .execute(
                query,
                &[&comment.id, &comment.post_id, &comment.author_id, &comment.text, &comment.created_at],
            )
            .await
            .map_err(ApiError::from)?;

        info!("Created comment {} on post {}", comment.id, comment.post_id);
        Ok(comment.clone())
    }

    async fn list_comments(&self, post_id: Uuid) -> ApiResult<Vec<Comment>> {
        let client = self.get_connection().await?;
        let query = format!(
            "SELECT {} FROM comments c JOIN users u ON u.id = c.author_id WHERE c.post_id = $1 {}",
            COMMENT_COLUMNS, COMMENT_ORDER
        );

        let rows = client.query(&query, &[&post_id]).await.map_err(ApiError::from)?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn follow_exists(&self, user_id: Uuid, author_id: Uuid) -> ApiResult<bool> {
        let client = self.get_connection().await?;
        let query = "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)";

        let row = client
            .query_one(query, &[&user_id, &author_id])
            .await
            .map_err(ApiError::from)?;

        Ok(row.get(0))
    }

    /// 一意制約に任せて `ON CONFLICT DO NOTHING` で冪等にする。
    async fn insert_follow_if_absent(&self, follow: &Follow) -> ApiResult<bool> {
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO follows (id, user_id, author_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, author_id) DO NOTHING
        "#;

        let rows_affected = client
            .execute(
                query,
                &[&follow.id, &follow.user_id, &follow.author_id, &follow.created_at],
            )
            .await
            .map_err(ApiError::from)?;

        Ok(rows_affected > 0)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> ApiResult<bool> {
        let client = self.get_connection().await?;

        let rows_affected = client
            .execute(
                "DELETE FROM follows WHERE user_id = $1 AND author_id = $2",
                &[&user_id, &author_id],
            )
            .await
            .map_err(ApiError::from)?;

        Ok(rows_affected > 0)
    }
}
