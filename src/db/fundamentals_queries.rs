use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::{
    is_known_field, Breakpoints, EnrichedPeer, FairValueMetrics, IcScore,
    LifecycleClassification, MetricDataPoint, MetricDistribution, MetricMapping, MetricValues,
    PeerSource, StockProfile, Timeframe,
};

/// One row of the latest-sector-percentiles materialized view.
#[derive(Debug, FromRow)]
pub struct SectorPercentileRow {
    pub sector: String,
    pub metric_name: String,
    pub calculated_at: DateTime<Utc>,
    pub min_value: Option<f64>,
    pub p10_value: Option<f64>,
    pub p25_value: Option<f64>,
    pub p50_value: Option<f64>,
    pub p75_value: Option<f64>,
    pub p90_value: Option<f64>,
    pub max_value: Option<f64>,
    pub mean_value: Option<f64>,
    pub std_dev: Option<f64>,
    pub sample_count: Option<i32>,
}

impl From<SectorPercentileRow> for MetricDistribution {
    fn from(row: SectorPercentileRow) -> Self {
        let breakpoints = Breakpoints {
            min: row.min_value,
            p10: row.p10_value,
            p25: row.p25_value,
            p50: row.p50_value,
            p75: row.p75_value,
            p90: row.p90_value,
            max: row.max_value,
        };
        let mut dist = MetricDistribution::new(row.sector, row.metric_name, breakpoints, row.calculated_at);
        dist.mean = row.mean_value;
        dist.std_dev = row.std_dev;
        dist.sample_count = row.sample_count;
        dist
    }
}

/// Latest fundamentals joined with same-day valuation ratios.
#[derive(Debug, Default, FromRow)]
pub struct StockMetricsRow {
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub ebitda_margin: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub roic: Option<f64>,
    pub revenue_growth_yoy: Option<f64>,
    pub eps_growth_yoy: Option<f64>,
    pub fcf_growth_yoy: Option<f64>,
    pub ev_to_revenue: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub ev_to_fcf: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub net_debt_to_ebitda: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub ps_ratio: Option<f64>,
}

impl From<StockMetricsRow> for MetricValues {
    fn from(r: StockMetricsRow) -> Self {
        [
            ("gross_margin", r.gross_margin),
            ("operating_margin", r.operating_margin),
            ("net_margin", r.net_margin),
            ("ebitda_margin", r.ebitda_margin),
            ("roe", r.roe),
            ("roa", r.roa),
            ("roic", r.roic),
            ("revenue_growth_yoy", r.revenue_growth_yoy),
            ("eps_growth_yoy", r.eps_growth_yoy),
            ("fcf_growth_yoy", r.fcf_growth_yoy),
            ("ev_to_revenue", r.ev_to_revenue),
            ("ev_to_ebitda", r.ev_to_ebitda),
            ("ev_to_fcf", r.ev_to_fcf),
            ("current_ratio", r.current_ratio),
            ("quick_ratio", r.quick_ratio),
            ("debt_to_equity", r.debt_to_equity),
            ("interest_coverage", r.interest_coverage),
            ("net_debt_to_ebitda", r.net_debt_to_ebitda),
            ("dividend_yield", r.dividend_yield),
            ("payout_ratio", r.payout_ratio),
            ("pe_ratio", r.pe_ratio),
            ("pb_ratio", r.pb_ratio),
            ("ps_ratio", r.ps_ratio),
        ]
        .into_iter()
        .collect()
    }
}

pub async fn fetch_stock_profile(pool: &PgPool, ticker: &str) -> Result<Option<StockProfile>, sqlx::Error> {
    sqlx::query_as::<_, StockProfile>(
        r#"
        SELECT symbol,
               COALESCE(name, '') AS name,
               sector,
               industry,
               CAST(market_cap AS DOUBLE PRECISION) AS market_cap
        FROM tickers
        WHERE UPPER(symbol) = UPPER($1)
        LIMIT 1
        "#,
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_sector_percentiles(pool: &PgPool, sector: &str) -> Result<Vec<SectorPercentileRow>, sqlx::Error> {
    sqlx::query_as::<_, SectorPercentileRow>(
        r#"
        SELECT sector,
               metric_name,
               CAST(calculated_at AS TIMESTAMPTZ) AS calculated_at,
               CAST(min_value AS DOUBLE PRECISION) AS min_value,
               CAST(p10_value AS DOUBLE PRECISION) AS p10_value,
               CAST(p25_value AS DOUBLE PRECISION) AS p25_value,
               CAST(p50_value AS DOUBLE PRECISION) AS p50_value,
               CAST(p75_value AS DOUBLE PRECISION) AS p75_value,
               CAST(p90_value AS DOUBLE PRECISION) AS p90_value,
               CAST(max_value AS DOUBLE PRECISION) AS max_value,
               CAST(mean_value AS DOUBLE PRECISION) AS mean_value,
               CAST(std_dev AS DOUBLE PRECISION) AS std_dev,
               sample_count
        FROM mv_latest_sector_percentiles
        WHERE sector = $1
        ORDER BY metric_name
        "#,
    )
    .bind(sector)
    .fetch_all(pool)
    .await
}

pub async fn fetch_stock_metrics(pool: &PgPool, ticker: &str) -> Result<Option<StockMetricsRow>, sqlx::Error> {
    sqlx::query_as::<_, StockMetricsRow>(
        r#"
        SELECT
            CAST(m.gross_margin AS DOUBLE PRECISION) AS gross_margin,
            CAST(m.operating_margin AS DOUBLE PRECISION) AS operating_margin,
            CAST(m.net_margin AS DOUBLE PRECISION) AS net_margin,
            CAST(m.ebitda_margin AS DOUBLE PRECISION) AS ebitda_margin,
            CAST(m.roe AS DOUBLE PRECISION) AS roe,
            CAST(m.roa AS DOUBLE PRECISION) AS roa,
            CAST(m.roic AS DOUBLE PRECISION) AS roic,
            CAST(m.revenue_growth_yoy AS DOUBLE PRECISION) AS revenue_growth_yoy,
            CAST(m.eps_growth_yoy AS DOUBLE PRECISION) AS eps_growth_yoy,
            CAST(m.fcf_growth_yoy AS DOUBLE PRECISION) AS fcf_growth_yoy,
            CAST(m.ev_to_revenue AS DOUBLE PRECISION) AS ev_to_revenue,
            CAST(m.ev_to_ebitda AS DOUBLE PRECISION) AS ev_to_ebitda,
            CAST(m.ev_to_fcf AS DOUBLE PRECISION) AS ev_to_fcf,
            CAST(m.current_ratio AS DOUBLE PRECISION) AS current_ratio,
            CAST(m.quick_ratio AS DOUBLE PRECISION) AS quick_ratio,
            CAST(m.debt_to_equity AS DOUBLE PRECISION) AS debt_to_equity,
            CAST(m.interest_coverage AS DOUBLE PRECISION) AS interest_coverage,
            CAST(m.net_debt_to_ebitda AS DOUBLE PRECISION) AS net_debt_to_ebitda,
            CAST(m.dividend_yield AS DOUBLE PRECISION) AS dividend_yield,
            CAST(m.payout_ratio AS DOUBLE PRECISION) AS payout_ratio,
            CAST(v.ttm_pe_ratio AS DOUBLE PRECISION) AS pe_ratio,
            CAST(v.ttm_pb_ratio AS DOUBLE PRECISION) AS pb_ratio,
            CAST(v.ttm_ps_ratio AS DOUBLE PRECISION) AS ps_ratio
        FROM fundamental_metrics_extended m
        LEFT JOIN valuation_ratios v
            ON m.ticker = v.ticker AND m.calculation_date = v.calculation_date
        WHERE UPPER(m.ticker) = UPPER($1)
        ORDER BY m.calculation_date DESC
        LIMIT 1
        "#,
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_latest_ic_score(pool: &PgPool, ticker: &str) -> Result<Option<IcScore>, sqlx::Error> {
    sqlx::query_as::<_, IcScore>(
        r#"
        SELECT ticker,
               date,
               CAST(overall_score AS DOUBLE PRECISION) AS overall_score,
               CAST(financial_health_score AS DOUBLE PRECISION) AS financial_health_score
        FROM ic_scores
        WHERE UPPER(ticker) = UPPER($1)
        ORDER BY date DESC
        LIMIT 1
        "#,
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_lifecycle_classification(
    pool: &PgPool,
    ticker: &str,
) -> Result<Option<LifecycleClassification>, sqlx::Error> {
    sqlx::query_as::<_, LifecycleClassification>(
        r#"
        SELECT ticker,
               lifecycle_stage,
               CAST(classified_at AS TIMESTAMPTZ) AS classified_at,
               CAST(revenue_growth_yoy AS DOUBLE PRECISION) AS revenue_growth_yoy,
               CAST(net_margin AS DOUBLE PRECISION) AS net_margin,
               CAST(pe_ratio AS DOUBLE PRECISION) AS pe_ratio
        FROM lifecycle_classifications
        WHERE ticker = $1
        ORDER BY classified_at DESC
        LIMIT 1
        "#,
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_fair_value_metrics(pool: &PgPool, ticker: &str) -> Result<Option<FairValueMetrics>, sqlx::Error> {
    sqlx::query_as::<_, FairValueMetrics>(
        r#"
        SELECT m.ticker,
               CAST(m.dcf_fair_value AS DOUBLE PRECISION) AS dcf_fair_value,
               CAST(m.epv_fair_value AS DOUBLE PRECISION) AS epv_fair_value,
               CAST(m.graham_number AS DOUBLE PRECISION) AS graham_number,
               CAST(m.dcf_upside_percent AS DOUBLE PRECISION) AS dcf_upside_percent,
               CAST(m.wacc AS DOUBLE PRECISION) AS wacc,
               CAST(v.stock_price AS DOUBLE PRECISION) AS stock_price
        FROM fundamental_metrics_extended m
        LEFT JOIN valuation_ratios v
            ON m.ticker = v.ticker AND m.calculation_date = v.calculation_date
        WHERE UPPER(m.ticker) = UPPER($1)
        ORDER BY m.calculation_date DESC
        LIMIT 1
        "#,
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
}

/// Newest-first values of one JSONB field from the stored statements.
///
/// `mapping.field_name` must come from the metric mapping table.
pub async fn fetch_metric_history(
    pool: &PgPool,
    ticker: &str,
    mapping: MetricMapping,
    timeframe: Timeframe,
    limit: i64,
) -> Result<Vec<MetricDataPoint>, sqlx::Error> {
    if !is_known_field(mapping.field_name) {
        return Err(sqlx::Error::Protocol(format!(
            "unknown statement field: {}",
            mapping.field_name
        )));
    }

    sqlx::query_as::<_, MetricDataPoint>(
        r#"
        SELECT CAST(fs.period_end AS TEXT) AS period_end,
               fs.fiscal_year,
               fs.fiscal_quarter,
               CAST(fs.data->>$3 AS DOUBLE PRECISION) AS value
        FROM financial_statements fs
        JOIN tickers t ON fs.ticker_id = t.id
        WHERE UPPER(t.symbol) = UPPER($1)
          AND fs.statement_type = $2
          AND fs.timeframe = $4
          AND fs.data ? $3
        ORDER BY fs.period_end DESC
        LIMIT $5
        "#,
    )
    .bind(ticker)
    .bind(mapping.statement_type)
    .bind(mapping.field_name)
    .bind(timeframe.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Companies of similar size (0.25x to 4x market cap) in the same industry or
/// sector, closest market cap first, enriched with their latest scores and ratios.
pub async fn fetch_peers(
    pool: &PgPool,
    scope: PeerSource,
    classification: &str,
    market_cap: f64,
    exclude_ticker: &str,
    limit: i64,
) -> Result<Vec<EnrichedPeer>, sqlx::Error> {
    // Column names cannot be bound, so only these two are ever interpolated.
    let column = match scope {
        PeerSource::Industry => "industry",
        PeerSource::Sector => "sector",
    };

    let query = format!(
        r#"
        SELECT p.symbol, p.name, p.industry, p.market_cap,
               i.ic_score,
               v.pe_ratio,
               m.roe, m.revenue_growth_yoy, m.net_margin, m.debt_to_equity
        FROM (
            SELECT symbol,
                   COALESCE(name, '') AS name,
                   COALESCE(industry, '') AS industry,
                   CAST(market_cap AS DOUBLE PRECISION) AS market_cap
            FROM tickers
            WHERE {column} = $1
              AND UPPER(symbol) != UPPER($2)
              AND market_cap IS NOT NULL
              AND market_cap BETWEEN $3 * 0.25 AND $3 * 4.0
              AND asset_type = 'stock'
            ORDER BY ABS(market_cap - $3) ASC
            LIMIT $4
        ) p
        LEFT JOIN LATERAL (
            SELECT CAST(overall_score AS DOUBLE PRECISION) AS ic_score
            FROM ic_scores WHERE ticker = p.symbol
            ORDER BY date DESC LIMIT 1
        ) i ON true
        LEFT JOIN LATERAL (
            SELECT CAST(ttm_pe_ratio AS DOUBLE PRECISION) AS pe_ratio
            FROM valuation_ratios WHERE ticker = p.symbol
            ORDER BY calculation_date DESC LIMIT 1
        ) v ON true
        LEFT JOIN LATERAL (
            SELECT CAST(roe AS DOUBLE PRECISION) AS roe,
                   CAST(revenue_growth_yoy AS DOUBLE PRECISION) AS revenue_growth_yoy,
                   CAST(net_margin AS DOUBLE PRECISION) AS net_margin,
                   CAST(debt_to_equity AS DOUBLE PRECISION) AS debt_to_equity
            FROM fundamental_metrics_extended WHERE ticker = p.symbol
            ORDER BY calculation_date DESC LIMIT 1
        ) m ON true
        "#
    );

    sqlx::query_as::<_, EnrichedPeer>(&query)
        .bind(classification)
        .bind(exclude_ticker)
        .bind(market_cap)
        .bind(limit)
        .fetch_all(pool)
        .await
}
