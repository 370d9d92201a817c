// Esquema Diesel de la base biológica (SQLite, tablas con nombres CamelCase).
// Las tablas de enlace directo son opcionales: ver `capabilities`.
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    #[sql_name = "GeneAliases"]
    gene_aliases (alias, gene_id) {
        alias -> Text,
        gene_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "DrugAliases"]
    drug_aliases (alias, drug_id) {
        alias -> Text,
        drug_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "DiseaseAliases"]
    disease_aliases (alias, disease_id) {
        alias -> Text,
        disease_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "CompoundAliases"]
    compound_aliases (alias, compound_id) {
        alias -> Text,
        compound_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "Drugs"]
    drugs (id) {
        id -> Text,
    }
}
diesel::table! {
    #[sql_name = "Diseases"]
    diseases (id) {
        id -> Text,
    }
}
diesel::table! {
    #[sql_name = "GeneDiseases"]
    gene_diseases (gene_id, disease_id) {
        gene_id -> Text,
        disease_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "DiseaseDrugs"]
    disease_drugs (disease_id, drug_id) {
        disease_id -> Text,
        drug_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "GenePathways"]
    gene_pathways (gene_id, pathway_id) {
        gene_id -> Text,
        pathway_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "DrugPathways"]
    drug_pathways (drug_id, pathway_id) {
        drug_id -> Text,
        pathway_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "DrugGenes"]
    drug_genes (drug_id, gene_id) {
        drug_id -> Text,
        gene_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "DrugCompounds"]
    drug_compounds (drug_id, compound_id) {
        drug_id -> Text,
        compound_id -> Text,
    }
}
diesel::table! {
    #[sql_name = "DrugStructures"]
    drug_structures (drug_id) {
        drug_id -> Text,
        smiles -> Nullable<Text>,
    }
}
diesel::table! {
    #[sql_name = "CompoundStructures"]
    compound_structures (compound_id) {
        compound_id -> Text,
        smiles -> Nullable<Text>,
    }
}
diesel::table! {
    #[sql_name = "Interaction"]
    interaction (id) {
        id -> Integer,
        source_name -> Text,
        target_name -> Text,
        relation_type -> Nullable<Text>,
        source_type -> Text,
        target_type -> Text,
    }
}
diesel::table! {
    #[sql_name = "Subtype"]
    subtype (id) {
        id -> Integer,
        interaction_id -> Integer,
        name -> Nullable<Text>,
        value -> Nullable<Text>,
    }
}
allow_tables_to_appear_in_same_query!(gene_diseases, disease_drugs, gene_pathways, drug_pathways, drug_genes, drug_compounds);
allow_tables_to_appear_in_same_query!(interaction, subtype);
