//! Views created while emitting resources
//!
//! The FHIR bundle is assembled entirely in SQL from the aggregate tables the
//! content step fills.

use super::admin::{ORCH_SESSION, ORCH_SESSION_ENTRY, ORCH_SESSION_ISSUE};
use crate::core::sources::ContentShape;

pub const ISSUE_CLASSIFICATION_VIEW: &str = "orch_session_issue_classification";
pub const FHIR_BUNDLE_VIEW: &str = "fhir_bundle";

/// Issues joined with the business rules that decide rejection vs warning
pub fn issue_classification_view() -> String {
    format!(
        r#"CREATE OR REPLACE VIEW {ISSUE_CLASSIFICATION_VIEW} AS
WITH cte_business_rule AS (
    SELECT worksheet AS worksheet,
        field AS field,
        required AS required,
        "Resolved by QE/QCS" AS resolved_by_qe_qcs,
        CONCAT(
            CASE WHEN UPPER("True Rejection") = 'YES' THEN 'REJECTION' ELSE '' END,
            CASE WHEN UPPER("Warning Layer") = 'YES' THEN 'WARNING' ELSE '' END
        ) AS record_action
    FROM business_rules
)
SELECT
    ises.* EXCLUDE (orch_started_at, orch_finished_at),
    isee.* EXCLUDE (session_id),
    isi.* EXCLUDE (session_id, session_entry_id, remediation),
    br.record_action AS disposition,
    COALESCE(isi.remediation, CASE WHEN UPPER(br.resolved_by_qe_qcs) = 'YES' THEN 'Resolved By QE/QCS' ELSE NULL END) AS remediation
FROM {ORCH_SESSION} AS ises
JOIN {ORCH_SESSION_ENTRY} AS isee ON ises.orch_session_id = isee.session_id
LEFT JOIN {ORCH_SESSION_ISSUE} AS isi ON isee.orch_session_entry_id = isi.session_entry_id
LEFT OUTER JOIN cte_business_rule br ON br.field = isi.issue_column
WHERE isi.orch_session_issue_id IS NOT NULL;"#
    )
}

fn org_reference(alias: &str) -> String {
    format!(
        "LOWER(REPLACE({a}.FACILITY_LONG_NAME, ' ', '-')) || '-' || LOWER(REPLACE({a}.ORGANIZATION_TYPE, ' ', '-')) || '-' || LOWER(REPLACE({a}.FACILITY_ID, ' ', '-'))",
        a = alias
    )
}

fn coded_extension(system: &str, code: &str, display: &str, url: &str) -> String {
    format!(
        "json_object('extension', json_array(json_object('url', 'ombCategory', 'valueCoding', json_object('system', {system}, 'code', {code}, 'display', {display}))), 'url', '{url}')"
    )
}

/// FHIR transaction bundle over patient, consent, organization, observation
/// and encounter projections
pub fn fhir_bundle_view(bundle_id: &str) -> String {
    let screening = ContentShape::Screening.aggregate_table();
    let demographic = ContentShape::AdminDemographic.aggregate_table();
    let qe_admin = ContentShape::QeAdminData.aggregate_table();
    let qat_org = org_reference("qat");
    let qed_org = org_reference("qed");
    let last_updated = |alias: &str| {
        format!(
            "(SELECT MAX(scr.RECORDED_TIME) FROM {screening} scr WHERE {alias}.FACILITY_ID = scr.FACILITY_ID)"
        )
    };
    let adt_updated = last_updated("adt");
    let qed_updated = last_updated("qed");
    let race = coded_extension(
        "RACE_CODE_SYSTEM_NAME",
        "RACE_CODE",
        "RACE_CODE_DESCRIPTION",
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-race",
    );
    let ethnicity = coded_extension(
        "ETHNICITY_CODE_SYSTEM_NAME",
        "ETHNICITY_CODE",
        "ETHNICITY_CODE_DESCRIPTION",
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-ethnicity",
    );
    let birth_sex = coded_extension(
        "SEX_AT_BIRTH_CODE_SYSTEM",
        "SEX_AT_BIRTH_CODE",
        "SEX_AT_BIRTH_CODE_DESCRIPTION",
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-birthsex",
    );
    let orientation = coded_extension(
        "SEXUAL_ORIENTATION_CODE_SYSTEM_NAME",
        "SEXUAL_ORIENTATION_CODE",
        "SEXUAL_ORIENTATION_DESCRIPTION",
        "http://shinny.org/StructureDefinition/shinny-sexual-orientation",
    );

    format!(
        r#"CREATE OR REPLACE VIEW {FHIR_BUNDLE_VIEW} AS
WITH cte_fhir_patient AS (
    SELECT adt.PAT_MRN_ID, json_object('fullUrl', CONCAT(adt.FACILITY_ID, '-', adt.PAT_MRN_ID),
        'resource', json_object(
            'resourceType', 'Patient',
            'id', CONCAT(adt.FACILITY_ID, '-', adt.PAT_MRN_ID),
            'meta', json_object(
                'lastUpdated', {adt_updated},
                'profile', json_array('http://shinny.org/StructureDefinition/shinny-patient')
            ),
            'language', adt.PREFERRED_LANGUAGE_CODE,
            'extension', json_array(
                {race},
                {ethnicity},
                {birth_sex},
                {orientation}
            ),
            'identifier', json_array(
                json_object(
                    'type', json_object(
                        'coding', json_array(json_object('system', 'http://terminology.hl7.org/CodeSystem/v2-0203', 'code', 'MR')),
                        'text', 'Medical Record Number'
                    ),
                    'system', adt.FACILITY_ID,
                    'value', adt.PAT_MRN_ID,
                    'assigner', json_object('reference', 'Organization/' || {qat_org})
                ),
                CASE WHEN adt.MEDICAID_CIN != '' THEN
                    json_object(
                        'type', json_object('coding', json_array(json_object('system', 'http://terminology.hl7.org/CodeSystem/v2-0203', 'code', 'MA'))),
                        'system', 'http://www.medicaid.gov/',
                        'value', adt.MEDICAID_CIN,
                        'assigner', json_object('reference', 'Organization/2.16.840.1.113883.3.249')
                    )
                ELSE NULL END,
                CASE WHEN adt.MPI_ID IS NOT NULL THEN
                    json_object(
                        'type', json_object('coding', json_array(json_object('system', 'http://terminology.hl7.org/CodeSystem/v2-0203', 'code', 'PN'))),
                        'system', 'http://www.acme.com/identifiers/patient',
                        'value', adt.MPI_ID
                    )
                ELSE NULL END
            ),
            'name', json_array(json_object(
                'text', CONCAT(adt.FIRST_NAME, ' ', adt.MIDDLE_NAME, ' ', adt.LAST_NAME),
                'family', adt.LAST_NAME,
                'given', json_array(adt.FIRST_NAME, adt.MIDDLE_NAME)
            )),
            'gender', adt.GENDER_IDENTITY_CODE_DESCRIPTION,
            'birthDate', adt.PAT_BIRTH_DATE,
            'address', json_array(json_object(
                'text', CONCAT(adt.ADDRESS1, ' ', adt.ADDRESS2),
                'line', json_array(adt.ADDRESS1, adt.ADDRESS2),
                'city', adt.CITY,
                'state', adt.STATE,
                'postalCode', CAST(adt.ZIP AS TEXT)
            )),
            'communication', json_array(json_object(
                'language', json_object('coding', json_array(json_object('code', adt.PREFERRED_LANGUAGE_CODE))),
                'preferred', true
            ))
        )) AS FHIR_Patient
    FROM {demographic} adt LEFT JOIN {qe_admin} qat ON adt.PAT_MRN_ID = qat.PAT_MRN_ID
),
cte_fhir_consent AS (
    SELECT adt.PAT_MRN_ID, json_object('fullUrl', CONCAT('consentFor', adt.PAT_MRN_ID),
        'resource', json_object(
            'resourceType', 'Consent',
            'id', CONCAT('consentFor', adt.PAT_MRN_ID),
            'meta', json_object(
                'lastUpdated', {adt_updated},
                'profile', json_array('http://shinny.org/StructureDefinition/shinny-consent')
            ),
            'status', 'active',
            'category', json_object('coding', json_array(json_object('system', 'http://terminology.hl7.org/CodeSystem/v3-ActCode', 'code', 'IDSCL'))),
            'patient', json_object('reference', CONCAT('Patient/', adt.PAT_MRN_ID)),
            'datetime', {adt_updated},
            'organization', json_object('reference', 'Organization/' || {qat_org})
        )) AS FHIR_Consent
    FROM {demographic} adt LEFT JOIN {qe_admin} qat ON adt.PAT_MRN_ID = qat.PAT_MRN_ID
    WHERE LOWER(adt.CONSENT) = 'yes'
),
cte_fhir_org AS (
    SELECT qed.PAT_MRN_ID, json_object(
        'fullUrl', {qed_org},
        'resource', json_object(
            'resourceType', 'Organization',
            'id', {qed_org},
            'meta', json_object(
                'lastUpdated', {qed_updated},
                'profile', json_array('http://shinny.org/StructureDefinition/shin-ny-organization')
            ),
            'identifier', json_array(json_object('system', qed.FACILITY_ID, 'value', {qed_org})),
            'active', true,
            'type', json_array(json_object('coding', json_array(json_object(
                'system', 'http://terminology.hl7.org/CodeSystem/organization-type',
                'code', qed.ORGANIZATION_TYPE,
                'display', qed.ORGANIZATION_TYPE
            )))),
            'name', qed.FACILITY_LONG_NAME,
            'address', json_array(json_object(
                'text', CONCAT(qed.FACILITY_ADDRESS1, ' ', qed.FACILITY_ADDRESS2),
                'city', qed.FACILITY_CITY,
                'state', qed.FACILITY_STATE,
                'postalCode', CAST(qed.FACILITY_ZIP AS TEXT)
            ))
        )) AS FHIR_Organization
    FROM {qe_admin} qed
),
cte_fhir_observation AS (
    SELECT scr.PAT_MRN_ID, json_object(
        'fullUrl', CONCAT('observation', scr.QUESTION_CODE),
        'resource', json_object(
            'resourceType', 'Observation',
            'id', CONCAT('observation', scr.QUESTION_CODE),
            'meta', json_object(
                'lastUpdated', scr.RECORDED_TIME,
                'profile', json_array('http://hl7.org/fhir/us/sdoh-clinicalcare/StructureDefinition/SDOHCC-ObservationScreeningResponse')
            ),
            'status', scr.SCREENING_STATUS_CODE,
            'category', json_array(
                json_object('coding', json_array(json_object('system', 'http://terminology.hl7.org/CodeSystem/observation-category', 'code', 'social-history', 'display', 'Social History'))),
                json_object('coding', json_array(json_object('system', 'http://terminology.hl7.org/CodeSystem/observation-category', 'code', 'survey', 'display', 'Survey')))
            ),
            'code', json_object('coding', json_array(json_object('system', scr.SCREENING_CODE_SYSTEM_NAME, 'code', scr.QUESTION_CODE, 'display', scr.QUESTION_CODE_DESCRIPTION))),
            'subject', json_object('reference', CONCAT('Patient/', scr.PAT_MRN_ID)),
            'effectiveDateTime', scr.RECORDED_TIME,
            'issued', scr.RECORDED_TIME,
            'valueCodeableConcept', json_object('coding', json_array(json_object('system', 'http://loinc.org', 'code', scr.ANSWER_CODE, 'display', scr.ANSWER_CODE_DESCRIPTION)))
        )) AS FHIR_Observation
    FROM {screening} scr
),
cte_fhir_encounter AS (
    SELECT scr.ENCOUNTER_ID, json_object(
        'resource', json_object(
            'resourceType', 'Encounter',
            'id', scr.ENCOUNTER_ID,
            'meta', json_object(
                'lastUpdated', scr.RECORDED_TIME,
                'profile', json_array('http://shinny.org/StructureDefinition/shin-ny-encounter')
            ),
            'status', scr.ENCOUNTER_STATUS_CODE_DESCRIPTION,
            'class', json_array(json_object('coding', json_array(json_object('system', scr.ENCOUNTER_CLASS_CODE_SYSTEM, 'code', scr.ENCOUNTER_CLASS_CODE)))),
            'type', json_array(json_object('coding', json_array(json_object('system', scr.ENCOUNTER_TYPE_CODE_SYSTEM, 'code', CAST(scr.ENCOUNTER_TYPE_CODE AS TEXT))))),
            'subject', json_object('reference', CONCAT('Patient/', scr.FACILITY_ID, '-', scr.PAT_MRN_ID))
        )) AS FHIR_Encounter
    FROM {screening} scr
    GROUP BY scr.ENCOUNTER_ID, scr.RECORDED_TIME, scr.ENCOUNTER_STATUS_CODE_DESCRIPTION, scr.ENCOUNTER_CLASS_CODE_SYSTEM,
        scr.ENCOUNTER_CLASS_CODE, scr.ENCOUNTER_TYPE_CODE_SYSTEM, scr.ENCOUNTER_TYPE_CODE, scr.PAT_MRN_ID, scr.FACILITY_ID
)
SELECT json_object(
    'resourceType', 'Bundle',
    'id', '{bundle_id}',
    'type', 'transaction',
    'meta', json_object('lastUpdated', (SELECT MAX(scr.RECORDED_TIME) FROM {screening} scr)),
    'timestamp', CURRENT_TIMESTAMP,
    'entry', json(json_group_array(json_data))
) AS FHIR_Bundle
FROM (
    SELECT FHIR_Organization AS json_data FROM cte_fhir_org
    UNION ALL
    SELECT FHIR_Patient AS json_data FROM cte_fhir_patient
    UNION ALL
    SELECT FHIR_Observation AS json_data FROM cte_fhir_observation
    UNION ALL
    SELECT FHIR_Encounter AS json_data FROM cte_fhir_encounter
    UNION ALL
    SELECT FHIR_Consent AS json_data FROM cte_fhir_consent
);"#
    )
}
