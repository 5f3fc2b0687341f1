use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SurveyResponses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SurveyResponses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SurveyResponses::LineId).string_len(50).not_null())
                    .col(ColumnDef::new(SurveyResponses::Itinerary).string_len(200).null())
                    .col(ColumnDef::new(SurveyResponses::Punctuality).integer().not_null())
                    .col(ColumnDef::new(SurveyResponses::Frequency).integer().not_null())
                    .col(ColumnDef::new(SurveyResponses::Comfort).integer().not_null())
                    .col(ColumnDef::new(SurveyResponses::Service).integer().not_null())
                    .col(ColumnDef::new(SurveyResponses::Infrastructure).integer().not_null())
                    .col(ColumnDef::new(SurveyResponses::Comment).text().null())
                    .col(
                        ColumnDef::new(SurveyResponses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_survey_responses_line_created")
                    .table(SurveyResponses::Table)
                    .col(SurveyResponses::LineId)
                    .col(SurveyResponses::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LineCounters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LineCounters::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LineCounters::LineId)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(LineCounters::Count)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LineCounters::LastReportAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reports::LineId).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Reports::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reports::PeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Reports::PeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reports::TotalResponses).integer().not_null())
                    .col(ColumnDef::new(Reports::MeanPunctuality).double().not_null())
                    .col(ColumnDef::new(Reports::MeanFrequency).double().not_null())
                    .col(ColumnDef::new(Reports::MeanComfort).double().not_null())
                    .col(ColumnDef::new(Reports::MeanService).double().not_null())
                    .col(ColumnDef::new(Reports::MeanInfrastructure).double().not_null())
                    .col(ColumnDef::new(Reports::MeanOverall).double().not_null())
                    .col(ColumnDef::new(Reports::ResponsesJson).text().not_null())
                    .col(ColumnDef::new(Reports::Comments).text().null())
                    .col(
                        ColumnDef::new(Reports::Processed)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reports_line_id")
                    .table(Reports::Table)
                    .col(Reports::LineId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reports::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LineCounters::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SurveyResponses::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SurveyResponses {
    Table,
    Id,
    LineId,
    Itinerary,
    Punctuality,
    Frequency,
    Comfort,
    Service,
    Infrastructure,
    Comment,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LineCounters {
    Table,
    Id,
    LineId,
    Count,
    LastReportAt,
}

#[derive(DeriveIden)]
enum Reports {
    Table,
    Id,
    LineId,
    CreatedAt,
    PeriodStart,
    PeriodEnd,
    TotalResponses,
    MeanPunctuality,
    MeanFrequency,
    MeanComfort,
    MeanService,
    MeanInfrastructure,
    MeanOverall,
    ResponsesJson,
    Comments,
    Processed,
}
